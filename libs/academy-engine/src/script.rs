/// Script Synthesis
///
/// Pure functions that assemble runnable Python from learner code and
/// generated harness code. Nothing here touches processes or files, so the
/// exact text handed to the interpreter can be unit tested.

use crate::framing::{STDERR_END, STDERR_START, STDOUT_END, STDOUT_START};
use base64::{engine::general_purpose, Engine as _};

pub const SUMMARY_PREFIX: &str = "PASSED:";
pub const FAILURES_HEADER: &str = "FAILURES:";

const INDENT: &str = "    ";

/// Encode `text` as a Python string literal.
///
/// A JSON string is also a valid Python literal, which covers quotes,
/// backslashes, newlines and non-ASCII text.
pub fn python_string_literal(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

fn indent_block(code: &str) -> String {
    if code.trim().is_empty() {
        return format!("{}pass\n", INDENT);
    }
    let mut out = String::new();
    for line in code.lines() {
        if line.trim().is_empty() {
            out.push('\n');
        } else {
            out.push_str(INDENT);
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

fn preamble_block(preamble: &[String]) -> String {
    let mut out = String::new();
    for statement in preamble {
        out.push_str(statement);
        out.push('\n');
    }
    out
}

/// Wrapper used by `execute`: runs learner code with its output buffered and
/// prints both buffers between framing markers.
///
/// The learner code travels base64-encoded and runs in a fresh `__main__`
/// namespace that already holds the preamble imports. Every exception,
/// including a non-zero `SystemExit`, is appended to the buffered stderr so
/// the marker block is always printed.
pub fn execution_wrapper(preamble: &[String], code: &str) -> String {
    let encoded = general_purpose::STANDARD.encode(code);
    let mut script = String::new();

    script.push_str(
        "import sys as _sys\n\
         import io as _io\n\
         import base64 as _base64\n\
         import traceback as _traceback\n\
         from contextlib import redirect_stdout as _redirect_stdout, redirect_stderr as _redirect_stderr\n\
         \n",
    );
    script.push_str(&preamble_block(preamble));
    script.push_str(
        "\n\
         _namespace = {_k: _v for _k, _v in list(globals().items()) if not _k.startswith(\"_\")}\n\
         _namespace[\"__name__\"] = \"__main__\"\n\
         _namespace[\"__builtins__\"] = __builtins__\n\
         \n\
         _stdout_buffer = _io.StringIO()\n\
         _stderr_buffer = _io.StringIO()\n",
    );
    script.push_str(&format!(
        "_user_code = _base64.b64decode(\"{}\").decode(\"utf-8\")\n\n",
        encoded
    ));
    script.push_str(
        "try:\n\
         \x20   with _redirect_stdout(_stdout_buffer), _redirect_stderr(_stderr_buffer):\n\
         \x20       exec(compile(_user_code, \"<learner>\", \"exec\"), _namespace)\n\
         except SystemExit as _exit:\n\
         \x20   if _exit.code not in (None, 0):\n\
         \x20       _stderr_buffer.write(_traceback.format_exc())\n\
         except BaseException:\n\
         \x20   _stderr_buffer.write(_traceback.format_exc())\n\
         \n",
    );
    script.push_str(&format!(
        "_sys.stdout.write({})\n\
         _sys.stdout.write(_stdout_buffer.getvalue())\n\
         _sys.stdout.write({})\n\
         _sys.stdout.write({})\n\
         _sys.stdout.write(_stderr_buffer.getvalue())\n\
         _sys.stdout.write({})\n\
         _sys.stdout.flush()\n",
        python_string_literal(STDOUT_START),
        python_string_literal(STDOUT_END),
        python_string_literal(STDERR_START),
        python_string_literal(STDERR_END),
    ));
    script
}

/// Script for ASSERT exercises: preamble, learner code, then every test run
/// independently with its outcome recorded.
///
/// Prints `PASSED:<passed>/<total>` and, when anything failed, a `FAILURES:`
/// block with one `  Test <n>: <message>` line per failure.
pub fn assert_harness(preamble: &[String], code: &str, tests: &[String]) -> String {
    let mut script = preamble_block(preamble);

    script.push_str("\n# Learner code\n");
    script.push_str(code);
    if !code.ends_with('\n') {
        script.push('\n');
    }

    script.push_str(&format!(
        "\n# Tests\n_passed = 0\n_failed = []\n_total = {}\n",
        tests.len()
    ));

    for (idx, test) in tests.iter().enumerate() {
        let label = python_string_literal(&format!("Test {}", idx + 1));
        let fallback = python_string_literal(test.trim());
        script.push_str("\ntry:\n");
        script.push_str(&indent_block(test));
        script.push_str(&format!(
            "{indent}_passed += 1\n\
             except AssertionError as _e:\n\
             {indent}_failed.append(({label}, str(_e) if str(_e) else {fallback}))\n\
             except Exception as _e:\n\
             {indent}_failed.append(({label}, f\"Error: {{type(_e).__name__}}: {{_e}}\"))\n",
            indent = INDENT,
            label = label,
            fallback = fallback,
        ));
    }

    script.push_str(&format!(
        "\nprint(f\"{summary}{{_passed}}/{{_total}}\")\n\
         if _failed:\n\
         {indent}print(\"{failures}\")\n\
         {indent}for _name, _message in _failed:\n\
         {indent}{indent}print(f\"  {{_name}}: {{_message}}\")\n",
        summary = SUMMARY_PREFIX,
        failures = FAILURES_HEADER,
        indent = INDENT,
    ));
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preamble() -> Vec<String> {
        vec!["import math".to_string()]
    }

    #[test]
    fn test_python_string_literal_escapes() {
        assert_eq!(python_string_literal("x == 2"), "\"x == 2\"");
        assert_eq!(python_string_literal("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(python_string_literal("a\nb"), "\"a\\nb\"");
        assert_eq!(python_string_literal("back\\slash"), "\"back\\\\slash\"");
    }

    #[test]
    fn test_assert_harness_layout() {
        let tests = vec!["assert x == 2".to_string(), "assert y > 0, 'y must be positive'".to_string()];
        let script = assert_harness(&preamble(), "x = 1 + 1\ny = 3", &tests);

        assert!(script.starts_with("import math\n"));
        assert!(script.contains("# Learner code\nx = 1 + 1\ny = 3\n"));
        assert!(script.contains("_total = 2\n"));
        assert!(script.contains("try:\n    assert x == 2\n    _passed += 1\n"));
        assert!(script.contains("_failed.append((\"Test 1\", str(_e) if str(_e) else \"assert x == 2\"))"));
        assert!(script.contains("_failed.append((\"Test 2\","));
        assert!(script.contains("f\"Error: {type(_e).__name__}: {_e}\""));
        assert!(script.contains("print(f\"PASSED:{_passed}/{_total}\")"));
        assert!(script.contains("print(\"FAILURES:\")"));
        assert!(script.contains("print(f\"  {_name}: {_message}\")"));
    }

    #[test]
    fn test_assert_harness_learner_code_before_tests() {
        let script = assert_harness(&[], "x = 1", &["assert x == 1".to_string()]);
        let code_at = script.find("x = 1\n").unwrap();
        let tests_at = script.find("# Tests").unwrap();
        assert!(code_at < tests_at);
    }

    #[test]
    fn test_assert_harness_indents_multiline_tests() {
        let tests = vec!["for i in range(3):\n    assert i < 3".to_string()];
        let script = assert_harness(&[], "", &tests);
        assert!(script.contains("try:\n    for i in range(3):\n        assert i < 3\n    _passed += 1\n"));
    }

    #[test]
    fn test_assert_harness_quotes_in_fallback() {
        let tests = vec![r#"assert name == "torch""#.to_string()];
        let script = assert_harness(&[], "name = 'torch'", &tests);
        assert!(script.contains(r#"else "assert name == \"torch\"""#));
    }

    #[test]
    fn test_assert_harness_no_tests() {
        let script = assert_harness(&[], "x = 1", &[]);
        assert!(script.contains("_total = 0\n"));
        assert!(!script.contains("try:"));
        assert!(script.contains("PASSED:"));
    }

    #[test]
    fn test_blank_test_becomes_pass() {
        let script = assert_harness(&[], "", &["   ".to_string()]);
        assert!(script.contains("try:\n    pass\n    _passed += 1\n"));
    }

    #[test]
    fn test_execution_wrapper_embeds_encoded_code() {
        let code = "print('hi')\n";
        let script = execution_wrapper(&preamble(), code);
        let encoded = general_purpose::STANDARD.encode(code);

        assert!(script.contains(&format!("_base64.b64decode(\"{}\")", encoded)));
        assert!(!script.contains("print('hi')"));
        assert!(script.contains("\nimport math\n"));
        assert!(script.contains("exec(compile(_user_code, \"<learner>\", \"exec\"), _namespace)"));
        assert!(script.contains("except BaseException:"));
    }

    #[test]
    fn test_execution_wrapper_prints_markers_in_order() {
        let script = execution_wrapper(&[], "pass");
        let positions: Vec<usize> = [STDOUT_START, STDOUT_END, STDERR_START, STDERR_END]
            .iter()
            .map(|marker| script.find(marker).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(script.trim_end().ends_with("_sys.stdout.flush()"));
    }
}
