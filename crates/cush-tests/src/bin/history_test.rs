//! Tests the `history` built-in: earlier commands must be listed in order.

use std::process::ExitCode;

fn main() -> ExitCode {
    cush_expect::run(|t| {
        t.expect_prompt("Prompt did not appear.")?;

        // A few commands to build history.
        t.sendline("echo hello")?;
        t.expect("hello", "echo did not print expected output")?;
        t.expect_prompt("Prompt not shown after echo command.")?;

        t.sendline("info")?;
        t.expect("Hostname:", "info did not print hostname")?;
        t.expect("Current Directory:", "info did not print current directory")?;
        t.expect_prompt("Prompt not shown after info command.")?;

        // Entries look like "1: <command>".
        t.sendline("history")?;
        t.expect("echo hello", "History does not list the 'echo hello' command.")?;
        t.expect("info", "History does not list the 'info' command.")?;
        t.expect_prompt("Prompt not shown after history command.")?;

        t.test_success()
    })
}
