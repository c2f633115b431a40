//! Tests the `info` built-in: it must print the hostname and the current
//! directory, then prompt again.

use std::process::ExitCode;

fn main() -> ExitCode {
    cush_expect::run(|t| {
        t.expect_prompt_default()?;

        t.sendline("info")?;

        let expected_hostname = cush_tests::hostname();
        let expected_cwd = cush_tests::expected_cwd(t.config())
            .map_err(|e| t.fail(&format!("cannot determine the expected directory: {e}")))?;

        t.expect(
            expected_hostname.as_str(),
            "Hostname is not printed correctly by the info command",
        )?;
        t.expect(
            expected_cwd.to_string_lossy().as_ref(),
            "Current directory is not printed correctly by the info command",
        )?;

        t.expect_prompt("Shell did not print expected prompt after info command")?;

        t.test_success()
    })
}
