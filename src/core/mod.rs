pub mod live;

// Re-export commonly used types for convenience
pub use live::{
    BoxedLiveTransport, ConnectionState, GeminiLive, GeminiLiveModel, LiveConfig, LiveError,
    LiveResult, LiveTransport, ResponseModality, ToolAck, ToolDeclaration, ToolInvocation,
};
