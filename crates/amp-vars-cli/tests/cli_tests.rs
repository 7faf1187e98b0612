use assert_cmd::cargo;
use rstest::rstest;
use scopeguard::defer;
use std::io::Write;
use std::{fs::File, path::PathBuf};

pub fn create_file(name: &str, content: &str) -> PathBuf {
    let temp_file_path = std::env::temp_dir().join(name);
    let mut file = File::create(&temp_file_path).expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write to temp file");

    temp_file_path
}

#[rstest]
#[case::var(vec!["--var", "title=Hello AMP", "t=${title}"], "t=Hello%20AMP\n")]
#[case::cookie(
    vec!["--cookie", "_ga=GA1.2.345", "--var", "ga=COOKIE", "c=${ga(_ga)}"],
    "c=GA1.2.345\n"
)]
#[case::array(vec!["--array", "ids=1,2,3", "ids=${ids}"], "ids=1,2,3\n")]
#[case::no_encode(vec!["--no-encode", "--var", "q=a b", "q=${q}"], "q=a b\n")]
#[case::freeze(vec!["--freeze", "extra", "--var", "extra=x", "${extra}"], "${extra}\n")]
#[case::meta(vec!["--meta", "brand=amp", "--var", "b=AMPDOC_META(brand)", "b=${b}"], "b=amp\n")]
#[case::calc(vec!["--var", "r=$CALC(10,4,divide,1)", "${r}"], "3\n")]
#[case::iterations(
    vec!["--iterations", "0", "--no-encode", "--var", "a=${b}", "--var", "b=leaf", "${a}"],
    "${b}\n"
)]
#[case::allowlist(
    vec!["--allow", "$TRIM", "--cookie", "_ga=1", "--var", "c=COOKIE(_ga)", "--no-encode", "${c}"],
    "COOKIE(_ga)\n"
)]
#[case::production(vec!["--production", "--var", "x=$CALC(1,0,divide)", "x=${x}"], "x=\n")]
#[case::performance(vec!["--var", "f=FIRST_CONTENTFUL_PAINT", "f=${f}"], "f=\n")]
#[case::embedded(
    vec!["--embedded", "--var", "f=FIRST_CONTENTFUL_PAINT", "f=${f}"],
    "f=FIRST_CONTENTFUL_PAINT\n"
)]
#[case::macro_name_in_text(vec!["--var", "t=Accept COOKIE policy", "t=${t}"], "t=Accept%20%20policy\n")]
#[case::no_placeholders(vec!["https://example.com/?a=1"], "https://example.com/?a=1\n")]
fn test_cli_commands(
    #[case] args: Vec<&str>,
    #[case] expected_output: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = cargo::cargo_bin_cmd!("amp-vars");

    let assert = cmd.args(args).assert();
    assert.success().code(0).stdout(expected_output.to_owned());

    Ok(())
}

#[test]
fn test_cli_run_with_stdin() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = cargo::cargo_bin_cmd!("amp-vars");

    let assert = cmd
        .arg("--var")
        .arg("a=1")
        .write_stdin("a=${a}\n")
        .assert();
    assert.success().code(0).stdout("a=1\n");

    Ok(())
}

#[test]
fn test_cli_run_with_file_input() -> Result<(), Box<dyn std::error::Error>> {
    let temp_file_path = create_file(
        "test_cli_run_with_file_input.txt",
        "https://example.com/?cid=${cid}",
    );
    let temp_file_path_clone = temp_file_path.clone();

    defer! {
        if temp_file_path_clone.exists() {
            std::fs::remove_file(&temp_file_path_clone).expect("Failed to delete temp file");
        }
    }

    let mut cmd = cargo::cargo_bin_cmd!("amp-vars");

    let assert = cmd
        .arg("--var")
        .arg("cid=amp 1")
        .arg("-f")
        .arg(temp_file_path.to_string_lossy().to_string())
        .assert();
    assert
        .success()
        .code(0)
        .stdout("https://example.com/?cid=amp%201\n");

    Ok(())
}

#[test]
fn test_cli_missing_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = cargo::cargo_bin_cmd!("amp-vars");

    let assert = cmd.arg("-f").arg("does-not-exist.txt").assert();
    assert.failure();

    Ok(())
}

#[rstest]
#[case::zero_division(vec!["--var", "x=$CALC(1,0,divide)", "x=${x}"])]
#[case::not_a_number(vec!["--var", "x=$SUBSTR(abc, one)", "${x}"])]
#[case::missing_argument(vec!["--var", "x=$SUBSTR(abc)", "${x}"])]
fn test_cli_macro_failures(#[case] args: Vec<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = cargo::cargo_bin_cmd!("amp-vars");

    let assert = cmd.args(args).assert();
    assert.failure();

    Ok(())
}
