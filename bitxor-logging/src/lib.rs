// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

/// Emits a structured trace event: `bitxor_trace!("genesis.observe", {"height": 1})`
#[macro_export]
macro_rules! bitxor_trace {
    ($evt:expr, $params:tt) => {
        tracing::trace!("bitxor_trace:{}:{}", $evt, serde_json::json!($params));
    };
}
