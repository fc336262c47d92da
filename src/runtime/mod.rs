mod error;
mod logging;


use crate::common::*;
use crate::lang::eval::{EvalConfig, Heap, Prompt, RuntimeTypeKind};
use crate::lang::symbols::SymbolTable;
use crate::lang::{CompileOutput, Image, LoadError, MemberUnit, TypeTag};

pub use crate::lang::eval::{Argument, ReclaimPolicy, RuntimeObject};
pub use error::{InvokeError, SaveError};

pub type SessionId = u32;

pub trait Logger: Debug + Send {
    fn line_writer(&mut self) -> Option<&mut dyn std::io::Write>;
    /// Writes everything logged so far, if the logger keeps it around
    fn dump_log(&self, w: &mut dyn std::io::Write);
}
#[derive(Debug)]
pub struct DummyLogger;
#[derive(Debug)]
pub struct VecLogger(SessionId, Vec<u8>);
#[derive(Debug)]
pub struct FileLogger(SessionId, std::fs::File);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bytes available to the heap
    pub heap_capacity: u32,
    pub max_call_depth: usize,
    pub reclaim_policy: ReclaimPolicy,
    /// File that `Session::save_archive` writes to
    pub archive_path: PathBuf,
}

/// Host side of the runtime: owns the heap that invoked members allocate on
/// and the logger their invocations are reported to. Images are not owned by
/// the session, the same image may be invoked by many sessions.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    logger: Box<dyn Logger>,
    config: SessionConfig,
    heap: Heap,
    num_invocations: u64,
}
////////////////////////////////
impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heap_capacity: 1 << 20,
            max_call_depth: 256,
            reclaim_policy: ReclaimPolicy::Bulk,
            archive_path: default_archive_path(),
        }
    }
}

fn default_archive_path() -> PathBuf {
    let data_dir = std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share")))
        .unwrap_or_else(std::env::temp_dir);
    data_dir.join("quill").join("archive.bin")
}

fn matches_tag(kind: RuntimeTypeKind, tag: TypeTag) -> bool {
    match kind {
        _ if tag == TypeTag::GENERIC => true,
        RuntimeTypeKind::Primitive(v) => tag == TypeTag::primitive(v),
        RuntimeTypeKind::String => tag == TypeTag::STRING,
        RuntimeTypeKind::Array(v) => tag == TypeTag::array(v),
        RuntimeTypeKind::Archive => tag == TypeTag::ARCHIVE,
    }
}

impl Session {
    /// Guesses a session id using the system's source of randomness.
    pub fn random_id() -> SessionId {
        type IdBytes = [u8; std::mem::size_of::<SessionId>()];
        let mut bytes = IdBytes::default();
        // Falls back to the clock
        if getrandom::getrandom(&mut bytes).is_err() {
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|dur| dur.subsec_nanos())
                .unwrap_or(0);
            return nanos;
        }
        SessionId::from_le_bytes(bytes)
    }

    pub fn new(logger: Box<dyn Logger>, config: SessionConfig, id: SessionId) -> Self {
        let mut session = Self {
            id,
            logger,
            heap: Heap::new(config.heap_capacity),
            config,
            num_invocations: 0,
        };
        log!(
            session.logger,
            "Session created with heap capacity {}, max call depth {}, {:?} reclamation",
            session.config.heap_capacity,
            session.config.max_call_depth,
            session.config.reclaim_policy
        );
        session
    }

    /// Session with a random id, default configuration and without logging
    pub fn new_simple() -> Self {
        Self::new(Box::new(DummyLogger), SessionConfig::default(), Self::random_id())
    }

    pub fn id(&self) -> SessionId {
        self.id
    }
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
    pub fn heap(&self) -> &Heap {
        &self.heap
    }
    pub fn get_logger(&self) -> &dyn Logger {
        &*self.logger
    }

    /// Binds and emits the given members. Diagnostics and emission errors are
    /// returned to the caller, the session only reports how it went.
    pub fn compile(&mut self, table: &SymbolTable, units: &[MemberUnit]) -> CompileOutput {
        let output = crate::lang::compile(table, units);
        log!(
            self.logger,
            "Compiled {} unit(s) into {} member(s), {} diagnostic(s), {} emission error(s)",
            units.len(),
            output.image.members().len(),
            output.diagnostics.len(),
            output.emit_errors.len()
        );
        for error in output.emit_errors.iter() {
            log!(self.logger, "{}", error);
        }
        output
    }

    pub fn load_image(&mut self, bytes: &[u8]) -> Result<Image, LoadError> {
        let result = Image::from_bytes(bytes);
        match &result {
            Ok(image) => log!(self.logger, "Loaded image of {} byte(s), {} member(s)", bytes.len(), image.members().len()),
            Err(err) => log!(self.logger, "Failed to load image: {}", err),
        }
        result
    }

    /// Runs `member` (named like `Type.method`) of `image` to completion.
    /// A fault aborts the whole invocation, but leaves the session usable.
    pub fn invoke(
        &mut self,
        image: &Image,
        member: &str,
        arguments: Vec<Argument>,
    ) -> Result<Option<RuntimeObject>, InvokeError> {
        let index = image
            .member_index(member)
            .ok_or_else(|| InvokeError::UnknownMember(member.to_string()))?;
        let code = image.member(index);
        if code.parameters.len() != arguments.len() {
            return Err(InvokeError::WrongNumberOfArguments {
                member: member.to_string(),
                expected: code.parameters.len(),
                got: arguments.len(),
            });
        }
        for (index, (argument, tag)) in arguments.iter().zip(code.parameters.iter()).enumerate() {
            if !matches_tag(argument.kind(), *tag) {
                return Err(InvokeError::ArgumentTypeMismatch {
                    member: member.to_string(),
                    index,
                    expected: *tag,
                    got: argument.kind(),
                });
            }
            if let Argument::Object(object) = argument {
                let live = self.heap.object_at(object.address()).map(|v| v.is_same_object(object));
                if live != Some(true) {
                    return Err(InvokeError::ForeignObject { member: member.to_string(), index });
                }
            }
        }

        self.num_invocations += 1;
        log!(
            self.logger,
            "Invocation {}: '{}' with {} argument(s), heap at {}/{}",
            self.num_invocations,
            member,
            arguments.len(),
            self.heap.used(),
            self.heap.capacity()
        );
        let config = EvalConfig {
            max_call_depth: self.config.max_call_depth,
            reclaim_policy: self.config.reclaim_policy,
        };
        let result = Prompt::new(image, index, arguments, &mut self.heap, config)
            .and_then(|mut prompt| prompt.run(&mut self.heap));
        match &result {
            Ok(Some(object)) => log!(self.logger, "'{}' returned {}", member, object.display()),
            Ok(None) => log!(self.logger, "'{}' returned", member),
            Err(err) => log!(self.logger, "'{}' aborted: {}", member, err.fault),
        }
        Ok(result?)
    }

    /// The form in which a returned object is shown to the host
    pub fn display(&self, object: &RuntimeObject) -> String {
        object.display()
    }

    /// Writes the document of an archive to the configured archive path.
    pub fn save_archive(&mut self, object: &RuntimeObject) -> Result<PathBuf, SaveError> {
        let archive = object.as_archive().ok_or(SaveError::NotAnArchive)?;
        let path = self.config.archive_path.clone();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        archive.save_to(&path)?;
        log!(self.logger, "Saved archive '{}' to {}", archive.document().name(), path.display());
        Ok(path)
    }

    /// Drops every object on the heap. Objects returned by earlier
    /// invocations are refused when passed back in afterwards.
    pub fn reset_heap(&mut self) {
        log!(self.logger, "Resetting heap holding {} object(s)", self.heap.num_objects());
        self.heap.reset();
    }
}
