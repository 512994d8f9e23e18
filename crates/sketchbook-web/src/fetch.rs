#![forbid(unsafe_code)]

//! `window.fetch` adapters for the template/source fetches and the API.

use std::future::Future;

use sketchbook_core::FetchError;
use sketchbook_host::{ApiError, ApiRequest, ApiResponse, HttpTransport};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Headers, Request, RequestCredentials, RequestInit, Response};

use crate::dom;

fn describe(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

async fn send(request: &Request) -> Result<(u16, String), JsValue> {
    let response: Response = JsFuture::from(dom::window()?.fetch_with_request(request))
        .await?
        .dyn_into()?;
    let status = response.status();
    let body = JsFuture::from(response.text()?).await?;
    Ok((status, body.as_string().unwrap_or_default()))
}

/// GET `url` as text. Non-2xx statuses are errors.
pub(crate) async fn fetch_text(url: &str) -> Result<String, FetchError> {
    let init = RequestInit::new();
    init.set_method("GET");
    init.set_credentials(RequestCredentials::SameOrigin);
    let request = Request::new_with_str_and_init(url, &init)
        .map_err(|err| FetchError::Network(describe(&err)))?;
    match send(&request).await {
        Ok((status, body)) if (200..300).contains(&status) => Ok(body),
        Ok((status, _)) => Err(FetchError::Status(status)),
        Err(err) => Err(FetchError::Network(describe(&err))),
    }
}

/// Same-origin transport carrying the session cookie.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct BrowserTransport;

impl BrowserTransport {
    fn build(request: &ApiRequest) -> Result<Request, JsValue> {
        let init = RequestInit::new();
        init.set_method(request.method.as_str());
        init.set_credentials(RequestCredentials::SameOrigin);
        if let Some(body) = &request.body {
            let headers = Headers::new()?;
            headers.set("Content-Type", "application/json")?;
            init.set_headers(&headers);
            init.set_body(&JsValue::from_str(body));
        }
        Request::new_with_str_and_init(&request.path, &init)
    }
}

impl HttpTransport for BrowserTransport {
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<ApiResponse, ApiError>> {
        async move {
            let built = Self::build(&request).map_err(|err| ApiError::Network(describe(&err)))?;
            let (status, body) = send(&built)
                .await
                .map_err(|err| ApiError::Network(describe(&err)))?;
            Ok(ApiResponse { status, body })
        }
    }
}
