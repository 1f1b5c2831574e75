use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// 全局共享 HTTP 客户端，单次请求超时由调用方设置
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!("pmd-gemini-service/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default HTTP client");
            Client::new()
        })
});

pub fn shared_client() -> &'static Client {
    &HTTP_CLIENT
}
