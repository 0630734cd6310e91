//! dotnet process runner for pgproj-build.
//!
//! This crate is the process boundary to the .NET toolchain. A [`Toolchain`]
//! spawns a process and hands back a [`ToolchainProcess`], a channel of
//! [`ProcessEvent`]s. [`drive`] consumes those events, forwarding every output
//! chunk as it arrives, and honors a [`CancelToken`] by killing the process.
//!
//! # Example
//!
//! ```ignore
//! use dotnet_runner::{drive, CancelToken, DotnetRunner, Toolchain};
//!
//! #[tokio::main]
//! async fn main() {
//!     let dotnet = DotnetRunner::find_dotnet().unwrap();
//!     let runner = DotnetRunner::new(dotnet);
//!     let token = CancelToken::new();
//!
//!     let args = vec!["build".to_string(), "db.pgproj".to_string()];
//!     let process = runner.spawn(&args).unwrap();
//!     let result = drive(process, |_, chunk| print!("{chunk}"), Some(&token)).await;
//!     println!("{result:?}");
//! }
//! ```

mod cancel;
mod process;
mod runner;
mod version;

pub use cancel::CancelToken;
pub use process::{drive, OutputStream, ProcessEvent, Toolchain, ToolchainProcess};
pub use runner::{check_sdk_version, DotnetError, DotnetRunner};
pub use version::{parse_version, version_in_range};
