//! error.rs — boot-path error taxonomy
//!
//! Two classes of condition flow through the loader. Fatal errors unwind
//! straight to the `Aborted` terminal state: nothing partially parsed,
//! partially read, or partially loaded may ever be executed. Non-fatal
//! conditions (`SignatureInvalid`, `MeasurementUnavailable`) are recorded
//! as data in the handoff block and the boot continues; the accept/reject
//! policy decision is deferred to the kernel.

use core::fmt;
use uefi::Status;

#[derive(Debug)]
pub enum LoadError {
    /// ELF magic or identification bytes are wrong.
    MalformedImage(&'static str),
    /// Image is ELF but not 64-bit little-endian.
    UnsupportedFormat(&'static str),
    /// Wrong machine type, or neither ET_EXEC nor ET_DYN.
    UnsupportedArchitecture(&'static str),
    /// Declared sizes reach past the bytes actually read.
    TruncatedImage(&'static str),
    /// Page allocation for the kernel span failed.
    OutOfMemory { pages: usize, status: Status },
    /// Image carries zero PT_LOAD segments.
    EmptyImage,
    /// The embedded trusted key failed to decode: the loader binary
    /// itself is corrupt. Unrelated to ordinary verification failure.
    CryptoConfigError(&'static str),

    /// Non-fatal: detached signature missing or did not verify.
    SignatureInvalid,
    /// Non-fatal: TPM or Secure-Boot state could not be read.
    MeasurementUnavailable,

    /// Kernel image absent at every known path.
    ImageNotFound,
    /// Firmware-media read failed or came up short. Never retried.
    ReadFailed(&'static str),
    /// A firmware service call failed outright.
    FirmwareCall { desc: &'static str, status: Status },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::MalformedImage(s) => write!(f, "malformed image: {}", s),
            LoadError::UnsupportedFormat(s) => write!(f, "unsupported format: {}", s),
            LoadError::UnsupportedArchitecture(s) => {
                write!(f, "unsupported architecture: {}", s)
            }
            LoadError::TruncatedImage(s) => write!(f, "truncated image: {}", s),
            LoadError::OutOfMemory { pages, status } => {
                write!(f, "out of memory ({} pages): {:?}", pages, status)
            }
            LoadError::EmptyImage => write!(f, "image has no loadable segments"),
            LoadError::CryptoConfigError(s) => {
                write!(f, "crypto configuration corrupt: {}", s)
            }
            LoadError::SignatureInvalid => write!(f, "kernel signature invalid"),
            LoadError::MeasurementUnavailable => write!(f, "platform measurement unavailable"),
            LoadError::ImageNotFound => write!(f, "kernel image not found"),
            LoadError::ReadFailed(s) => write!(f, "read failed: {}", s),
            LoadError::FirmwareCall { desc, status } => write!(f, "{}: {:?}", desc, status),
        }
    }
}

impl LoadError {
    /// Fatal errors abort the boot; non-fatal conditions are folded into
    /// the trust score and the pipeline keeps going.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            LoadError::SignatureInvalid | LoadError::MeasurementUnavailable
        )
    }

    pub fn category(&self) -> &'static str {
        match self {
            LoadError::MalformedImage(_)
            | LoadError::UnsupportedFormat(_)
            | LoadError::UnsupportedArchitecture(_)
            | LoadError::TruncatedImage(_)
            | LoadError::EmptyImage => "image",

            LoadError::OutOfMemory { .. } => "memory",

            LoadError::CryptoConfigError(_) | LoadError::SignatureInvalid => "crypto",

            LoadError::MeasurementUnavailable => "measure",

            LoadError::ImageNotFound | LoadError::ReadFailed(_) => "file",

            LoadError::FirmwareCall { .. } => "uefi",
        }
    }
}

pub type LoadResult<T> = core::result::Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(LoadError::MalformedImage("bad magic").is_fatal());
        assert!(LoadError::TruncatedImage("phdr table").is_fatal());
        assert!(LoadError::EmptyImage.is_fatal());
        assert!(LoadError::CryptoConfigError("modulus").is_fatal());
        assert!(LoadError::ImageNotFound.is_fatal());

        assert!(!LoadError::SignatureInvalid.is_fatal());
        assert!(!LoadError::MeasurementUnavailable.is_fatal());
    }

    #[test]
    fn categories() {
        assert_eq!(LoadError::MalformedImage("x").category(), "image");
        assert_eq!(LoadError::EmptyImage.category(), "image");
        assert_eq!(LoadError::SignatureInvalid.category(), "crypto");
        assert_eq!(LoadError::MeasurementUnavailable.category(), "measure");
        assert_eq!(LoadError::ImageNotFound.category(), "file");
    }
}
