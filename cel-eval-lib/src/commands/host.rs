use std::io::Write;

/// Where commands send their output and how they terminate
///
/// The binary wires this to the process streams; tests capture output in memory instead.
pub trait Host: Send + Sync {
    // results (e.g., stdout)
    fn output(&mut self) -> impl Write;

    // diagnostics (e.g., stderr)
    fn error(&mut self) -> impl Write;

    /// Terminate the process (a test host may only record the code).
    fn exit(&mut self, code: i32);
}

/// Test host that captures output and the exit code
#[cfg(test)]
#[derive(Debug, Default)]
pub struct TestHost {
    pub output_buf: Vec<u8>,
    pub error_buf: Vec<u8>,
    pub exit_code: Option<i32>,
}

#[cfg(test)]
impl TestHost {
    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output_buf).into_owned()
    }

    pub fn error_text(&self) -> String {
        String::from_utf8_lossy(&self.error_buf).into_owned()
    }
}

#[cfg(test)]
impl Host for TestHost {
    fn output(&mut self) -> impl Write {
        &mut self.output_buf
    }

    fn error(&mut self) -> impl Write {
        &mut self.error_buf
    }

    fn exit(&mut self, code: i32) {
        self.exit_code = Some(code);
    }
}
