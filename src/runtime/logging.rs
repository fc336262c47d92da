use super::*;

fn secs_since_unix_epoch() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|dur| dur.as_secs_f64())
        .unwrap_or(0.)
}
impl FileLogger {
    pub fn new(session_id: SessionId, file: std::fs::File) -> Self {
        Self(session_id, file)
    }
}
impl VecLogger {
    pub fn new(session_id: SessionId) -> Self {
        Self(session_id, Default::default())
    }
    pub fn contents(&self) -> &[u8] {
        &self.1
    }
}
/////////////////
impl Logger for DummyLogger {
    fn line_writer(&mut self) -> Option<&mut dyn std::io::Write> {
        None
    }
    fn dump_log(&self, _: &mut dyn std::io::Write) {}
}

impl Logger for VecLogger {
    fn line_writer(&mut self) -> Option<&mut dyn std::io::Write> {
        let _ = write!(&mut self.1, "SID({}) at {:.6} ", self.0, secs_since_unix_epoch());
        Some(self)
    }
    fn dump_log(&self, w: &mut dyn std::io::Write) {
        let _ = w.write_all(self.contents());
    }
}
impl Logger for FileLogger {
    fn line_writer(&mut self) -> Option<&mut dyn std::io::Write> {
        let _ = write!(&mut self.1, "SID({}) at {:.6} ", self.0, secs_since_unix_epoch());
        Some(&mut self.1)
    }
    // lines went straight to the file
    fn dump_log(&self, _: &mut dyn std::io::Write) {}
}
///////////////////
impl Drop for VecLogger {
    fn drop(&mut self) {
        if self.1.is_empty() {
            return;
        }
        let stderr = std::io::stderr();
        let mut lock = stderr.lock();
        let _ = writeln!(lock, "--- DROP LOG DUMP ---");
        let _ = std::io::Write::write(&mut lock, self.1.as_slice());
    }
}
impl std::io::Write for VecLogger {
    fn flush(&mut self) -> Result<(), std::io::Error> {
        Ok(())
    }
    fn write(&mut self, data: &[u8]) -> Result<usize, std::io::Error> {
        self.1.extend_from_slice(data);
        Ok(data.len())
    }
}
