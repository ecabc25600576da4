//! Score signing over `fetch`

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Headers, Request, RequestInit, RequestMode, Response};

use crate::chain::signing::{SignScoreRequest, decode_sign_response};
use crate::chain::{Address, ChainError, ScoreSignature, ScoreSigner};
use crate::settings::Settings;

pub struct HttpScoreSigner {
    sign_url: String,
    health_url: String,
}

impl HttpScoreSigner {
    pub fn new(settings: &Settings) -> Self {
        Self {
            sign_url: settings.sign_score_url(),
            health_url: settings.health_url(),
        }
    }

    async fn fetch(&self, url: &str, body: Option<&str>) -> Result<(bool, String), ChainError> {
        let network = |e: JsValue| ChainError::Network(format!("{:?}", e));

        let opts = RequestInit::new();
        opts.set_mode(RequestMode::Cors);
        if let Some(body) = body {
            opts.set_method("POST");
            opts.set_body(&JsValue::from_str(body));
            let headers = Headers::new().map_err(network)?;
            headers
                .set("Content-Type", "application/json")
                .map_err(network)?;
            opts.set_headers(&headers);
        } else {
            opts.set_method("GET");
        }

        let request = Request::new_with_str_and_init(url, &opts).map_err(network)?;
        let window = web_sys::window().ok_or(ChainError::Network("no window".to_string()))?;
        let response: Response = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(network)?
            .dyn_into()
            .map_err(network)?;

        let text = JsFuture::from(response.text().map_err(network)?)
            .await
            .map_err(network)?
            .as_string()
            .unwrap_or_default();
        Ok((response.ok(), text))
    }
}

impl ScoreSigner for HttpScoreSigner {
    async fn sign_score(&self, player: &Address, score: u64) -> Result<ScoreSignature, ChainError> {
        let body = serde_json::to_string(&SignScoreRequest {
            player: *player,
            score,
        })
        .map_err(|e| ChainError::Decode(e.to_string()))?;

        let (ok, text) = self
            .fetch(&self.sign_url, Some(&body))
            .await
            .map_err(|e| ChainError::Signing(e.to_string()))?;
        decode_sign_response(ok, &text)
    }

    async fn health(&self) -> bool {
        match self.fetch(&self.health_url, None).await {
            Ok((ok, _)) => ok,
            Err(e) => {
                log::warn!("Signing service unreachable: {}", e);
                false
            }
        }
    }
}
