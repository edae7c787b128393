//! Responders that give a simulated device some behaviour.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use sdalink::{
    job::{CONFIGURE_SEPARATOR, CommandParam, DeviceCommand, Operation},
    message::Message,
    transport::simulated::Reply,
};

/// Reply with the received message unchanged.
pub fn echo() -> impl Fn(&[u8]) -> Reply + Send + Sync + 'static {
    |message| Reply::payload(message.to_vec())
}

/// Never reply.
pub fn silent() -> impl Fn(&[u8]) -> Reply + Send + Sync + 'static { |_| Reply::Silence }

/// Decode each message as a [`DeviceCommand`] before handing it to `f`.
/// Messages that fail to decode are ignored.
pub fn command_responder<F>(f: F) -> impl Fn(&[u8]) -> Reply + Send + Sync + 'static
where
    F: Fn(DeviceCommand) -> Reply + Send + Sync + 'static,
{
    move |message| match DeviceCommand::from_bytes(message) {
        Ok((command, _)) => f(command),
        Err(_) => Reply::Silence,
    }
}

/// A device-side file system answering read and configure commands.
///
/// Reads of a missing file answer with an empty payload, which the runner
/// treats as a failed task.
#[derive(Clone, Debug, Default)]
pub struct FileDevice {
    files: Arc<Mutex<BTreeMap<String, String>>>,
}

impl FileDevice {
    /// Seed a file.
    #[must_use]
    pub fn with_file(self, name: &str, content: &str) -> Self {
        if let Ok(mut files) = self.files.lock() {
            files.insert(name.to_owned(), content.to_owned());
        }
        self
    }

    /// Current content of `name`.
    #[must_use]
    pub fn file(&self, name: &str) -> Option<String> {
        self.files.lock().ok()?.get(name).cloned()
    }

    /// Responder bound to this file system.
    #[must_use]
    pub fn responder(&self) -> impl Fn(&[u8]) -> Reply + Send + Sync + 'static {
        let files = Arc::clone(&self.files);
        command_responder(move |command| {
            let Some(CommandParam::Str(arg)) = command.params.first() else {
                return Reply::payload(Bytes::new());
            };
            let Ok(mut files) = files.lock() else {
                return Reply::Silence;
            };
            match command.operation {
                Operation::Read => Reply::payload(
                    files
                        .get(arg)
                        .map(|content| content.clone().into_bytes())
                        .unwrap_or_default(),
                ),
                Operation::Configure => match arg.split_once(CONFIGURE_SEPARATOR) {
                    Some((name, content)) => {
                        files.insert(name.to_owned(), content.to_owned());
                        Reply::payload(Bytes::from_static(b"File Write Complete"))
                    }
                    None => Reply::payload(Bytes::new()),
                },
            }
        })
    }
}
