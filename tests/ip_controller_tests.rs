use std::io::Write;
use std::process::{Command, Stdio};

fn run_controller(input: &str) -> (bool, String) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_ip_controller"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(input.as_bytes()).unwrap();
    let output = child.wait_with_output().unwrap();
    (output.status.success(), String::from_utf8(output.stdout).unwrap())
}

#[test]
fn test_controller_answers_until_eof() {
    let input = concat!(
        r#"{"function":"model_output","model":{"xform":[1,0,0,0]},"time":0.0,"state":[],"input":[0,0,0,0]}"#,
        "\n",
        r#"{"function":"unknown","model":{},"time":0.0,"state":[],"input":[]}"#,
        "\n",
    );
    let (ok, out) = run_controller(input);
    assert!(ok);
    assert_eq!(out, "[0.0]\n[]\n");
}

#[test]
fn test_malformed_line_terminates_controller() {
    let good = r#"{"function":"model_output","model":{"xform":[1,0,0,0]},"time":0.0,"state":[],"input":[0,0,0,0]}"#;
    let (ok, out) = run_controller(&format!("{good}\nnot-json\n{good}\n"));
    assert!(!ok);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "[0.0]");
    assert!(lines[1].starts_with("ERROR:"));
}
