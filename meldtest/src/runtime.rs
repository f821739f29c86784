//! # Meld Test Runtime
//!
//! Plays the user program: stages paths and buffers in a process's memory
//! and traps into the simulated kernel through the syscall gate with raw
//! numbers and registers, exactly as a compiled test binary would.

use core_types::OpenFlags;
use kernel_api::syscalls::{SYS_CLOSE, SYS_MELD, SYS_OPEN, SYS_READ, SYS_WRITE};
use kernel_api::FileError;
use serde::{Deserialize, Serialize};
use sim_kernel::{ConfigError, KernelConfig, Process, SimulatedKernel, SyscallGate};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use vfs::MemVfs;

/// Permission bits for the source files the test creates
const SOURCE_MODE: u32 = 0o664;

/// Largest read used to fetch the merged file back
const READ_SIZE: usize = 16;

/// Meld test error types
#[derive(Debug, Error)]
pub enum MeldTestError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot read {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{call} failed: {error}")]
    Syscall {
        call: &'static str,
        error: FileError,
    },

    #[error("{call} returned unknown errno {errno}")]
    UnknownErrno { call: &'static str, errno: i64 },

    #[error("Short write to {path}: {written} of {expected} bytes")]
    ShortWrite {
        path: String,
        written: usize,
        expected: usize,
    },
}

/// Meld test configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeldTestConfig {
    /// Kernel limits
    pub kernel: KernelConfig,
    /// Contents written to the first source
    pub source1: String,
    /// Contents written to the second source
    pub source2: String,
    /// Path of the first source
    pub source1_path: String,
    /// Path of the second source
    pub source2_path: String,
    /// Path of the merged file
    pub merged_path: String,
}

impl Default for MeldTestConfig {
    fn default() -> Self {
        Self {
            kernel: KernelConfig::default(),
            source1: "01238901".to_string(),
            source2: "45672345".to_string(),
            source1_path: "source1".to_string(),
            source2_path: "source2".to_string(),
            merged_path: "merged".to_string(),
        }
    }
}

impl MeldTestConfig {
    /// Parses a JSON configuration
    ///
    /// Missing fields keep their defaults; the kernel limits are validated.
    pub fn from_json(json: &str) -> Result<Self, MeldTestError> {
        let config: MeldTestConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.kernel.validate()?;
        Ok(config)
    }

    /// Loads a JSON configuration file
    pub fn load(path: &Path) -> Result<Self, MeldTestError> {
        let json = std::fs::read_to_string(path).map_err(|source| MeldTestError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// What the merged file should contain for these sources
    pub fn expected(&self) -> Vec<u8> {
        interleave(self.source1.as_bytes(), self.source2.as_bytes())
    }
}

/// Outcome of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeldReport {
    /// Value meld returned
    pub bytes_written: u64,
    /// Merged file as read back through the descriptor calls
    pub contents: Vec<u8>,
    /// What the merged file should contain
    pub expected: Vec<u8>,
}

impl MeldReport {
    pub fn passed(&self) -> bool {
        self.contents == self.expected && self.bytes_written == self.expected.len() as u64
    }

    /// Renders the report the way the user-level test prints it
    pub fn render(&self) -> String {
        format!(
            "Bytes written= {} \n Contents:\n {}\nPassed meld test if Contents line = {}\n",
            self.bytes_written,
            String::from_utf8_lossy(&self.contents),
            String::from_utf8_lossy(&self.expected),
        )
    }
}

/// Reference interleaving used to check the kernel's output
fn interleave(first: &[u8], second: &[u8]) -> Vec<u8> {
    let chunk = sim_kernel::meld::CHUNK;
    let mut merged = Vec::new();
    let mut a = first.chunks(chunk);
    let mut b = second.chunks(chunk);
    loop {
        let (x, y) = (a.next(), b.next());
        if x.is_none() && y.is_none() {
            return merged;
        }
        for part in [x, y] {
            let part = part.unwrap_or(&[]);
            merged.extend_from_slice(part);
            merged.resize(merged.len() + chunk - part.len(), sim_kernel::meld::PAD);
        }
    }
}

/// One user process driving the kernel through raw traps
pub struct MeldTest {
    config: MeldTestConfig,
    vfs: Arc<MemVfs>,
    kernel: SimulatedKernel,
    process: Process,
    gate: SyscallGate,
}

impl MeldTest {
    /// Creates a kernel over an empty in-memory file system
    pub fn new(config: MeldTestConfig) -> Result<Self, MeldTestError> {
        config.kernel.validate()?;
        let vfs = Arc::new(MemVfs::new());
        let kernel = SimulatedKernel::new(vfs.clone()).with_config(config.kernel.clone());
        let process = kernel.create_process();
        Ok(Self {
            config,
            vfs,
            kernel,
            process,
            gate: SyscallGate::new(),
        })
    }

    /// File system the test runs against
    pub fn vfs(&self) -> &Arc<MemVfs> {
        &self.vfs
    }

    pub fn gate(&self) -> &SyscallGate {
        &self.gate
    }

    pub fn process(&self) -> &Process {
        &self.process
    }

    /// Runs the test: create both sources, meld them, read the result back
    pub fn run(&mut self) -> Result<MeldReport, MeldTestError> {
        let config = self.config.clone();
        self.create_source(&config.source1_path, config.source1.as_bytes())?;
        self.create_source(&config.source2_path, config.source2.as_bytes())?;

        let memory = self.process.memory();
        let args = [
            memory.map_str(&config.source1_path).addr(),
            memory.map_str(&config.source2_path).addr(),
            memory.map_str(&config.merged_path).addr(),
            0,
        ];
        let bytes_written = self.trap("meld", SYS_MELD, args)? as u64;
        log::info!(
            "melded {} and {} into {} ({} bytes)",
            config.source1_path,
            config.source2_path,
            config.merged_path,
            bytes_written
        );

        let contents = self.read_back(&config.merged_path)?;
        Ok(MeldReport {
            bytes_written,
            contents,
            expected: config.expected(),
        })
    }

    fn create_source(&mut self, path: &str, contents: &[u8]) -> Result<(), MeldTestError> {
        let flags = OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC;
        let fd = self.open(path, flags, SOURCE_MODE)?;

        let buf = self.process.memory().map_bytes(contents);
        let written = self.trap(
            "write",
            SYS_WRITE,
            [fd, buf.addr(), contents.len() as u64, 0],
        );
        self.trap("close", SYS_CLOSE, [fd, 0, 0, 0])?;

        let written = written? as usize;
        if written != contents.len() {
            return Err(MeldTestError::ShortWrite {
                path: path.to_string(),
                written,
                expected: contents.len(),
            });
        }
        log::debug!("wrote {} bytes to {}", written, path);
        Ok(())
    }

    fn read_back(&mut self, path: &str) -> Result<Vec<u8>, MeldTestError> {
        let fd = self.open(path, OpenFlags::RDONLY, 0)?;
        let size = READ_SIZE.min(self.config.kernel.max_transfer);
        let buf = self.process.memory().map(size);

        let mut contents = Vec::new();
        let result = loop {
            match self.trap("read", SYS_READ, [fd, buf.addr(), size as u64, 0]) {
                Ok(0) => break Ok(()),
                Ok(n) => match self.process.memory().read(buf, n as usize) {
                    Ok(bytes) => contents.extend_from_slice(&bytes),
                    Err(error) => break Err(MeldTestError::Syscall { call: "read", error }),
                },
                Err(error) => break Err(error),
            }
        };
        self.trap("close", SYS_CLOSE, [fd, 0, 0, 0])?;
        result.map(|()| contents)
    }

    fn open(&mut self, path: &str, flags: OpenFlags, mode: u32) -> Result<u64, MeldTestError> {
        let path = self.process.memory().map_str(path);
        let fd = self.trap(
            "open",
            SYS_OPEN,
            [path.addr(), flags.bits() as u64, mode as u64, 0],
        )?;
        Ok(fd as u64)
    }

    /// Traps into the kernel and decodes the `-errno` convention
    fn trap(&mut self, call: &'static str, number: usize, args: [u64; 4]) -> Result<i64, MeldTestError> {
        let caller = self.process.pid();
        let retval = self
            .gate
            .trap(&self.kernel, &self.process, caller, number, args);
        if retval >= 0 {
            return Ok(retval);
        }
        let errno = -retval;
        match i32::try_from(errno).ok().and_then(FileError::from_errno) {
            Some(error) => Err(MeldTestError::Syscall { call, error }),
            None => Err(MeldTestError::UnknownErrno { call, errno }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave_matches_known_outputs() {
        assert_eq!(interleave(b"01238901", b"45672345"), b"0123456789012345");
        assert_eq!(
            interleave(b"abcdef", b"0123456789"),
            b"abcd0123ef  4567    89  "
        );
        assert_eq!(interleave(b"", b""), b"");
    }

    #[test]
    fn test_default_config() {
        let config = MeldTestConfig::default();
        assert_eq!(config.expected(), b"0123456789012345");
        assert_eq!(config.kernel, KernelConfig::default());
    }

    #[test]
    fn test_config_from_json_keeps_defaults() {
        let config = MeldTestConfig::from_json(r#"{"source1": "abcdef"}"#).unwrap();
        assert_eq!(config.source1, "abcdef");
        assert_eq!(config.source2, "45672345");
        assert_eq!(config.merged_path, "merged");
    }

    #[test]
    fn test_config_from_json_rejects_bad_limits() {
        let result = MeldTestConfig::from_json(r#"{"kernel": {"open_max": 0}}"#);
        assert!(matches!(result, Err(MeldTestError::Config(_))));
    }

    #[test]
    fn test_config_from_json_rejects_garbage() {
        let result = MeldTestConfig::from_json("not json");
        assert!(matches!(
            result,
            Err(MeldTestError::Config(ConfigError::Parse(_)))
        ));
    }

    #[test]
    fn test_run_default() {
        let mut test = MeldTest::new(MeldTestConfig::default()).unwrap();
        let report = test.run().unwrap();

        assert_eq!(report.bytes_written, 16);
        assert_eq!(report.contents, b"0123456789012345");
        assert!(report.passed());
        assert_eq!(test.process().open_count(), 0);
        assert_eq!(test.vfs().open_handles(), 0);
    }

    #[test]
    fn test_run_unequal_sources() {
        let config = MeldTestConfig {
            source1: "abcdef".to_string(),
            source2: "0123456789".to_string(),
            ..MeldTestConfig::default()
        };
        let mut test = MeldTest::new(config).unwrap();
        let report = test.run().unwrap();

        assert_eq!(report.bytes_written, 24);
        assert_eq!(report.contents, b"abcd0123ef  4567    89  ");
        assert!(report.passed());
    }

    #[test]
    fn test_second_run_fails_on_existing_merged_file() {
        let mut test = MeldTest::new(MeldTestConfig::default()).unwrap();
        test.run().unwrap();

        let result = test.run();
        assert!(matches!(
            result,
            Err(MeldTestError::Syscall {
                call: "meld",
                error: FileError::AlreadyExists
            })
        ));
    }

    #[test]
    fn test_run_records_syscalls() {
        let mut test = MeldTest::new(MeldTestConfig::default()).unwrap();
        test.run().unwrap();

        let log = test.gate().audit_log();
        assert!(log.has_event(|e| matches!(
            e,
            sim_kernel::SyscallEvent::Completed { syscall_name, retval: 16, .. }
                if syscall_name == "Meld"
        )));
        assert_eq!(
            log.count_events(|e| matches!(e, sim_kernel::SyscallEvent::Rejected { .. })),
            0
        );
    }

    #[test]
    fn test_render() {
        let report = MeldReport {
            bytes_written: 16,
            contents: b"0123456789012345".to_vec(),
            expected: b"0123456789012345".to_vec(),
        };
        assert_eq!(
            report.render(),
            "Bytes written= 16 \n Contents:\n 0123456789012345\nPassed meld test if Contents line = 0123456789012345\n"
        );
    }

    #[test]
    fn test_report_failure() {
        let report = MeldReport {
            bytes_written: 16,
            contents: b"0123456789012344".to_vec(),
            expected: b"0123456789012345".to_vec(),
        };
        assert!(!report.passed());
    }
}
