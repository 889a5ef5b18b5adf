//! JS snippet builders for in-page operations.
//!
//! Selectors come from user config and are embedded as JSON-escaped string
//! literals — never spliced raw into the scripts.

/// Render a string as a JS string literal (JSON escaping).
pub(crate) fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| String::from("\"\""))
}

/// Expression yielding the document for the current frame context.
///
/// An empty path is the top document; each index hops into the Nth
/// iframe/frame (document order) of the previous document. Cross-origin
/// frames yield a null `contentDocument`, which the callers treat as
/// "not scriptable".
pub(crate) fn frame_doc_expr(path: &[usize]) -> String {
    let mut expr = String::from("document");
    for idx in path {
        expr = format!("{expr}.querySelectorAll('iframe, frame')[{idx}].contentDocument");
    }
    expr
}

/// Expression probing that the frame chain resolves to a scriptable document.
pub(crate) fn frame_probe_js(path: &[usize]) -> String {
    format!(
        "(function() {{ try {{ return {} != null; }} catch (e) {{ return false; }} }})()",
        frame_doc_expr(path)
    )
}

/// Promise that resolves once `selector` matches inside the current frame
/// document, polling every 100ms, rejecting at the timeout.
pub(crate) fn wait_for_element_js(path: &[usize], selector: &str, timeout_ms: u64) -> String {
    let doc_expr = frame_doc_expr(path);
    let sel = js_string(selector);
    format!(
        r#"(function() {{
    return new Promise((resolve, reject) => {{
        const deadline = Date.now() + {timeout_ms};
        (function poll() {{
            let doc;
            try {{ doc = {doc_expr}; }} catch (e) {{ doc = null; }}
            const el = doc ? doc.querySelector({sel}) : null;
            if (el) {{ resolve(true); return; }}
            if (Date.now() >= deadline) {{
                reject(new Error('No element matching ' + {sel} + ' after {timeout_ms}ms'));
                return;
            }}
            setTimeout(poll, 100);
        }})();
    }});
}})()"#
    )
}

/// Expression returning the center of the first `selector` match in top-page
/// coordinates (frame offsets accumulated along the chain), or null.
pub(crate) fn element_center_js(path: &[usize], selector: &str) -> String {
    let sel = js_string(selector);
    let mut hops = String::new();
    for idx in path {
        hops.push_str(&format!(
            r#"
    {{
        const f = doc.querySelectorAll('iframe, frame')[{idx}];
        if (!f || !f.contentDocument) return null;
        const fr = f.getBoundingClientRect();
        ox += fr.left; oy += fr.top;
        doc = f.contentDocument;
    }}"#
        ));
    }
    format!(
        r#"(function() {{
    let doc = document, ox = 0, oy = 0;{hops}
    const el = doc.querySelector({sel});
    if (!el) return null;
    const r = el.getBoundingClientRect();
    return {{ x: ox + r.left + r.width / 2, y: oy + r.top + r.height / 2 }};
}})()"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_document_has_no_frame_hops() {
        assert_eq!(frame_doc_expr(&[]), "document");
    }

    #[test]
    fn frame_chain_nests_in_order() {
        assert_eq!(
            frame_doc_expr(&[0, 2]),
            "document.querySelectorAll('iframe, frame')[0].contentDocument\
             .querySelectorAll('iframe, frame')[2].contentDocument"
        );
    }

    #[test]
    fn selectors_are_escaped_as_string_literals() {
        let js = wait_for_element_js(&[], r#"a[title="x"]"#, 30000);
        assert!(js.contains(r#""a[title=\"x\"]""#));
        // The raw selector must not appear unquoted.
        assert!(!js.contains(r#"querySelector(a[title"#));
    }

    #[test]
    fn wait_script_carries_the_timeout() {
        let js = wait_for_element_js(&[0], ".st-bw", 30000);
        assert!(js.contains("Date.now() + 30000"));
        assert!(js.contains("after 30000ms"));
        assert!(js.contains("querySelectorAll('iframe, frame')[0]"));
    }

    #[test]
    fn center_script_accumulates_frame_offsets() {
        let js = element_center_js(&[1], "#go");
        assert!(js.contains("ox += fr.left"));
        assert!(js.contains("querySelectorAll('iframe, frame')[1]"));
        assert!(js.contains(r##"querySelector("#go")"##));
    }

    #[test]
    fn center_script_without_frames_has_no_hops() {
        let js = element_center_js(&[], ".btn");
        assert!(!js.contains("contentDocument"));
    }
}
