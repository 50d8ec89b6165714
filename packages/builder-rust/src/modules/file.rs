//! Filesystem transport: reads `details.location` on every call.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::FutureExt;
use request_builder_core::RequestObject;
use serde_json::Value;

use crate::error::OperationError;
use crate::module::{failing_fn, AsyncFn, AsyncModule, ModuleContext};

/// How file contents are handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Utf8,
    Latin1,
    Ascii,
    Hex,
}

impl Encoding {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Some(Self::Utf8),
            "latin1" | "binary" => Some(Self::Latin1),
            "ascii" => Some(Self::Ascii),
            "hex" => Some(Self::Hex),
            _ => None,
        }
    }

    fn decode(self, bytes: &[u8]) -> Result<String, std::string::FromUtf8Error> {
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec()),
            Self::Latin1 => Ok(bytes.iter().map(|&byte| char::from(byte)).collect()),
            Self::Ascii => Ok(bytes.iter().map(|&byte| char::from(byte & 0x7f)).collect()),
            Self::Hex => Ok(bytes.iter().map(|byte| format!("{byte:02x}")).collect()),
        }
    }
}

pub struct FileModule;

impl FileModule {
    pub const NAME: &'static str = "file";
}

impl AsyncModule for FileModule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn async_fn(
        &self,
        details: &Value,
        _parent_details: Option<&Value>,
        _ctx: &ModuleContext,
    ) -> Option<AsyncFn> {
        let Some(location) = details.get("location").and_then(Value::as_str) else {
            return Some(failing_fn(OperationError::invalid_definition(
                "file operation requires a string `location`",
            )));
        };
        let encoding = match details.get("encoding").and_then(Value::as_str) {
            None => None,
            Some(name) => match Encoding::from_name(name) {
                Some(encoding) => Some(encoding),
                None => {
                    return Some(failing_fn(OperationError::invalid_definition(format!(
                        "unsupported file encoding `{name}`"
                    ))))
                }
            },
        };

        let location = Arc::new(PathBuf::from(location));
        Some(Arc::new(move |_request: RequestObject| {
            let location = Arc::clone(&location);
            async move { read(&location, encoding).await }.boxed()
        }))
    }
}

async fn read(location: &Path, encoding: Option<Encoding>) -> Result<Value, OperationError> {
    let bytes = tokio::fs::read(location)
        .await
        .map_err(|err| OperationError::transport(FileModule::NAME, format!("{}: {err}", location.display())))?;
    match encoding {
        Some(encoding) => encoding
            .decode(&bytes)
            .map(Value::String)
            .map_err(|err| OperationError::transport(FileModule::NAME, &err)),
        None => Ok(Value::Array(bytes.into_iter().map(Value::from).collect())),
    }
}
