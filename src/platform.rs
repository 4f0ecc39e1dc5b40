//! Per-platform locations for app data.

use crate::config::APP_DIR_NAME;
use crate::error::AppError;
use std::path::PathBuf;

#[cfg(target_os = "android")]
use jni::objects::{JObject, JString};
#[cfg(target_os = "android")]
use jni::JavaVM;
#[cfg(target_os = "android")]
use ndk_context::android_context;

/// Directory for app-private data such as the desktop media index
#[cfg(target_os = "android")]
pub fn app_data_dir() -> Result<PathBuf, AppError> {
    android_files_dir()
}

#[cfg(not(target_os = "android"))]
pub fn app_data_dir() -> Result<PathBuf, AppError> {
    let base = dirs::data_dir()
        .or_else(|| std::env::current_dir().ok())
        .ok_or_else(|| AppError::Config("no data directory available".to_string()))?;
    Ok(base.join(APP_DIR_NAME))
}

/// Default storage root when the configuration names none
#[cfg(target_os = "android")]
pub fn default_storage_root() -> Result<PathBuf, AppError> {
    Ok(media_store::MediaStoreConfig::default().external_root)
}

#[cfg(not(target_os = "android"))]
pub fn default_storage_root() -> Result<PathBuf, AppError> {
    Ok(app_data_dir()?.join("media"))
}

/// Path of the SQLite media index used off-device
pub fn index_db_path() -> Result<PathBuf, AppError> {
    Ok(app_data_dir()?.join("index.db"))
}

#[cfg(target_os = "android")]
fn android_files_dir() -> Result<PathBuf, AppError> {
    let ctx = android_context();
    let vm = unsafe { JavaVM::from_raw(ctx.vm() as *mut jni::sys::JavaVM) }
        .map_err(|e| AppError::Other(format!("JavaVM creation failed: {}", e)))?;
    let mut env = vm
        .attach_current_thread()
        .map_err(|e| AppError::Other(format!("Failed to attach thread: {}", e)))?;
    let context = unsafe { JObject::from_raw(ctx.context() as jni::sys::jobject) };

    let file = env
        .call_method(&context, "getFilesDir", "()Ljava/io/File;", &[])
        .and_then(|v| v.l())
        .map_err(|e| AppError::Other(format!("getFilesDir failed: {}", e)))?;
    let path = env
        .call_method(&file, "getAbsolutePath", "()Ljava/lang/String;", &[])
        .and_then(|v| v.l())
        .map_err(|e| AppError::Other(format!("getAbsolutePath failed: {}", e)))?;
    let path: String = env
        .get_string(&JString::from(path))
        .map_err(|e| AppError::Other(format!("Failed to read path: {}", e)))?
        .into();

    Ok(PathBuf::from(path))
}
