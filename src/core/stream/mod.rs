// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod input_stream;
pub mod output_stream;

pub use self::input_stream::{
    InputStream, InputStreamConfig, Listener, ListenerHandle, TimestampExtractor,
    DEFAULT_EXPIRY_WINDOW,
};
pub use self::output_stream::{OutputStream, StreamCallback};
