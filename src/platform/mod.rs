//! Browser bindings
//!
//! The page owns the wallet SDKs and exposes them to the game as a single
//! `window.towerWallet` object. Every call crosses the boundary as JSON
//! strings so the Rust side never depends on the JS shapes directly:
//!
//! - `kind`: `"connector"` (injected/browser wallet) or `"embedded"`
//! - `address`: connected account or `null`
//! - `sendTransaction(callJson)`: resolves to the transaction hash
//! - `getTransactionReceipt(hash)`: receipt JSON or `null`
//! - `waitForTransactionReceipt(hash)`: receipt JSON (connector only)
//! - `readContract(function, argsJson)`: result JSON
//!
//! `window.towerRender(snapshotJson)` is the draw hook.

pub mod signer;
pub mod wallet;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::chain::ChainError;

pub use signer::HttpScoreSigner;
pub use wallet::{AnyWallet, BridgeReader};

#[wasm_bindgen]
extern "C" {
    /// Page-provided wallet facade
    #[derive(Clone)]
    pub type WalletBridge;

    #[wasm_bindgen(method, getter)]
    fn kind(this: &WalletBridge) -> String;

    #[wasm_bindgen(method, getter)]
    fn address(this: &WalletBridge) -> Option<String>;

    #[wasm_bindgen(method, catch, js_name = sendTransaction)]
    fn send_transaction(this: &WalletBridge, call: &str) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(method, catch, js_name = getTransactionReceipt)]
    fn get_transaction_receipt(this: &WalletBridge, hash: &str) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(method, catch, js_name = waitForTransactionReceipt)]
    fn wait_for_transaction_receipt(
        this: &WalletBridge,
        hash: &str,
    ) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(method, catch, js_name = readContract)]
    fn read_contract(
        this: &WalletBridge,
        function: &str,
        args: &str,
    ) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(catch, js_namespace = window, js_name = towerRender)]
    fn tower_render(snapshot: &str) -> Result<(), JsValue>;
}

/// The page's wallet bridge, if it installed one
pub fn wallet_bridge() -> Option<WalletBridge> {
    let window = web_sys::window()?;
    let value = js_sys::Reflect::get(&window, &JsValue::from_str("towerWallet")).ok()?;
    if value.is_undefined() || value.is_null() {
        return None;
    }
    Some(value.unchecked_into())
}

/// Hand a serialized snapshot to the page renderer
pub fn render(snapshot_json: &str) {
    if let Err(e) = tower_render(snapshot_json) {
        log::warn!("Render hook failed: {:?}", e);
    }
}

/// Resolve after `ms` milliseconds
pub async fn sleep(ms: u32) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let _ = window
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms as i32);
    });
    let _ = JsFuture::from(promise).await;
}

/// Await a bridge promise that resolves to a string
async fn await_string(promise: Result<js_sys::Promise, JsValue>) -> Result<Option<String>, ChainError> {
    let value = JsFuture::from(promise.map_err(js_error)?)
        .await
        .map_err(js_error)?;
    if value.is_null() || value.is_undefined() {
        return Ok(None);
    }
    value
        .as_string()
        .map(Some)
        .ok_or_else(|| ChainError::Decode("expected a string from the wallet bridge".to_string()))
}

/// Map a thrown JS value to a chain error
///
/// EIP-1193 code 4001 and "rejected" messages mean the user declined.
fn js_error(value: JsValue) -> ChainError {
    let field = |name: &str| js_sys::Reflect::get(&value, &JsValue::from_str(name)).ok();
    let message = field("message")
        .and_then(|m| m.as_string())
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{:?}", value));
    let code = field("code").and_then(|c| c.as_f64());

    if code == Some(4001.0) || message.to_lowercase().contains("rejected") {
        ChainError::Rejected(message)
    } else {
        ChainError::Network(message)
    }
}
