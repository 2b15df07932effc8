//! Process-wide cached runtime instance.
//!
//! Demo binaries build their [`App`](crate::app::App) once and reuse it for
//! every request. Initialization is awaited before the first request is
//! served, so no further synchronization is needed around the instance.

use crate::app::App;
use crate::config::AppConfig;
use crate::error::Result;
use tokio::sync::OnceCell;

static INSTANCE: OnceCell<App> = OnceCell::const_new();

/// Build the app on first call, return the cached instance afterwards.
pub async fn get_or_build<F>(make_config: F) -> Result<&'static App>
where
    F: FnOnce() -> AppConfig,
{
    INSTANCE.get_or_try_init(|| async move { App::build(make_config()).await }).await
}
