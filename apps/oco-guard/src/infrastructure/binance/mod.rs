//! Binance Futures Adapters
//!
//! Implements the exchange ports against Binance USDⓈ-M futures:
//!
//! - **REST**: listen key lifecycle and signed order cancellation
//! - **User-Data Stream**: WebSocket frames for one listen key (JSON codec)

pub mod codec;
pub mod messages;
pub mod reconnect;
pub mod rest;
pub mod signing;
pub mod stream;

pub use codec::{CodecError, StreamMessage, UserDataCodec};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use rest::{BinanceRestClient, RestClientError};
pub use signing::{RequestSigner, SigningError};
pub use stream::{BinanceStreamConnector, StreamClientConfig, WebSocketFrameSource};
