// Camera capture and multi-image picking.
//
// The platform UI delivers its result through a callback at some later point.
// Each request registers a single-use completion slot, launches the platform
// activity and awaits exactly one result. On Android the activity is reached
// over JNI and answers through the `Java_..._on*` exports below; elsewhere
// launching returns `PlatformNotSupported`, and tests feed results in with
// `complete_capture` / `complete_pick`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerError {
    PermissionDenied(String),
    Cancelled(String),
    PlatformNotSupported(String),
    Other(String),
}

impl std::fmt::Display for PickerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PickerError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            PickerError::Cancelled(msg) => write!(f, "Cancelled: {}", msg),
            PickerError::PlatformNotSupported(msg) => write!(f, "Platform not supported: {}", msg),
            PickerError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for PickerError {}

type Completion<T> = oneshot::Sender<Result<T, PickerError>>;

/// Single-slot rendezvous between an awaiting request and a platform callback.
///
/// Registering again supersedes the previous request, whose awaiting side
/// then resolves to `PickerError::Cancelled`. Callbacks that arrive with no
/// request registered are logged and dropped.
pub struct CompletionSlot<T> {
    pending: Mutex<Option<(u64, Completion<T>)>>,
    next_ticket: AtomicU64,
}

impl<T> CompletionSlot<T> {
    pub const fn new() -> Self {
        Self {
            pending: Mutex::new(None),
            next_ticket: AtomicU64::new(1),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<(u64, Completion<T>)>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn register(&self) -> PendingResult<'_, T> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        if self.slot().replace((ticket, tx)).is_some() {
            log::debug!("Superseding pending picker request");
        }
        PendingResult {
            slot: self,
            ticket,
            rx,
        }
    }

    /// Delivers `result` to the registered request. Returns false when
    /// nothing was waiting for it.
    pub fn complete(&self, result: Result<T, PickerError>) -> bool {
        let Some((ticket, tx)) = self.slot().take() else {
            log::warn!("Ignoring picker result with no pending request");
            return false;
        };
        if tx.send(result).is_err() {
            log::warn!("Picker request {} went away before its result arrived", ticket);
            return false;
        }
        true
    }

    pub fn is_waiting(&self) -> bool {
        self.slot().is_some()
    }
}

impl<T> Default for CompletionSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The awaiting side of a registered request; dropping it releases the slot
pub struct PendingResult<'a, T> {
    slot: &'a CompletionSlot<T>,
    ticket: u64,
    rx: oneshot::Receiver<Result<T, PickerError>>,
}

impl<T> PendingResult<'_, T> {
    pub async fn wait(mut self) -> Result<T, PickerError> {
        match (&mut self.rx).await {
            Ok(result) => result,
            Err(_) => Err(PickerError::Cancelled(
                "request superseded by a newer one".to_string(),
            )),
        }
    }
}

impl<T> Drop for PendingResult<'_, T> {
    fn drop(&mut self) {
        let mut slot = self.slot.slot();
        if matches!(slot.as_ref(), Some((ticket, _)) if *ticket == self.ticket) {
            slot.take();
        }
    }
}

static CAPTURE_SLOT: CompletionSlot<PathBuf> = CompletionSlot::new();
static PICK_SLOT: CompletionSlot<Vec<String>> = CompletionSlot::new();

const DEFAULT_MAIN_ACTIVITY_CLASS: &str = "dev/unsplashgallery/app/MainActivity";

/// Configuration for the picker on Android
#[derive(Debug, Clone)]
pub struct AndroidPickerConfig {
    /// Fully qualified class name in slash format (e.g., "com/example/myapp/MainActivity")
    pub main_activity_class: String,
}

impl Default for AndroidPickerConfig {
    fn default() -> Self {
        Self {
            main_activity_class: DEFAULT_MAIN_ACTIVITY_CLASS.to_string(),
        }
    }
}

/// Launches the camera and waits for the captured photo's temporary file
pub async fn capture_photo() -> Result<PathBuf, PickerError> {
    capture_photo_with_config(&AndroidPickerConfig::default()).await
}

pub async fn capture_photo_with_config(
    config: &AndroidPickerConfig,
) -> Result<PathBuf, PickerError> {
    let pending = CAPTURE_SLOT.register();
    launch(config, "launchCamera")?;
    pending.wait().await
}

/// Launches the multi-select picker and waits for the chosen locators
pub async fn pick_images() -> Result<Vec<String>, PickerError> {
    pick_images_with_config(&AndroidPickerConfig::default()).await
}

pub async fn pick_images_with_config(
    config: &AndroidPickerConfig,
) -> Result<Vec<String>, PickerError> {
    let pending = PICK_SLOT.register();
    launch(config, "launchImagePickerMulti")?;
    pending.wait().await
}

/// Hands a camera result to the waiting `capture_photo` call
pub fn complete_capture(result: Result<PathBuf, PickerError>) -> bool {
    CAPTURE_SLOT.complete(result)
}

/// Hands a picker result to the waiting `pick_images` call
pub fn complete_pick(result: Result<Vec<String>, PickerError>) -> bool {
    PICK_SLOT.complete(result)
}

/// Splits the newline-joined locator list the activity sends back
pub fn parse_picked(combined: &str) -> Vec<String> {
    combined
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(target_os = "android")]
use jni::objects::{JClass, JObject, JString, JValue};

#[cfg(target_os = "android")]
use jni::JNIEnv;

#[cfg(target_os = "android")]
fn get_app_class_loader<'a>(env: &mut JNIEnv<'a>) -> Result<JObject<'a>, PickerError> {
    let at_cls = env
        .find_class("android/app/ActivityThread")
        .map_err(|e| PickerError::Other(format!("ActivityThread not found: {}", e)))?;
    let at = env
        .call_static_method(
            &at_cls,
            "currentActivityThread",
            "()Landroid/app/ActivityThread;",
            &[],
        )
        .and_then(|v| v.l())
        .map_err(|e| PickerError::Other(format!("currentActivityThread failed: {}", e)))?;

    let app = env
        .call_method(&at, "getApplication", "()Landroid/app/Application;", &[])
        .and_then(|v| v.l())
        .map_err(|e| PickerError::Other(format!("getApplication failed: {}", e)))?;

    env.call_method(&app, "getClassLoader", "()Ljava/lang/ClassLoader;", &[])
        .and_then(|v| v.l())
        .map_err(|e| PickerError::Other(format!("getClassLoader failed: {}", e)))
}

#[cfg(target_os = "android")]
fn get_activity_instance<'a>(
    env: &mut JNIEnv<'a>,
    config: &AndroidPickerConfig,
) -> Result<JObject<'a>, PickerError> {
    let loader = get_app_class_loader(env)?;
    let name: JString = env
        .new_string(config.main_activity_class.replace('/', "."))
        .map_err(|e| PickerError::Other(format!("new_string failed: {}", e)))?;
    let cls = env
        .call_method(
            &loader,
            "loadClass",
            "(Ljava/lang/String;)Ljava/lang/Class;",
            &[JValue::Object(&JObject::from(name))],
        )
        .and_then(|v| v.l())
        .map(JClass::from)
        .map_err(|e| PickerError::Other(format!("loadClass failed: {}", e)))?;

    let signature = format!("()L{};", config.main_activity_class);
    let instance = match env.call_static_method(&cls, "getInstance", &signature, &[]) {
        Ok(value) => value
            .l()
            .map_err(|e| PickerError::Other(format!("getInstance() invalid: {}", e)))?,
        Err(_) => {
            if env.exception_check().unwrap_or(false) {
                let _ = env.exception_clear();
            }
            // Kotlin companion object without @JvmStatic
            let companion_sig = format!("L{}$Companion;", config.main_activity_class);
            let companion = env
                .get_static_field(&cls, "Companion", &companion_sig)
                .and_then(|v| v.l())
                .map_err(|e| PickerError::Other(format!("Companion lookup failed: {}", e)))?;
            if companion.is_null() {
                return Err(PickerError::Other(
                    "MainActivity.Companion is null, activity not initialized?".to_string(),
                ));
            }
            env.call_method(&companion, "getInstance", &signature, &[])
                .and_then(|v| v.l())
                .map_err(|e| PickerError::Other(format!("Companion.getInstance() failed: {}", e)))?
        }
    };

    if instance.is_null() {
        return Err(PickerError::Other(
            "MainActivity instance is null, activity not initialized?".to_string(),
        ));
    }
    Ok(instance)
}

#[cfg(target_os = "android")]
fn launch(config: &AndroidPickerConfig, method: &str) -> Result<(), PickerError> {
    let vm = crate::android::java_vm().map_err(PickerError::Other)?;
    let mut env = vm
        .attach_current_thread()
        .map_err(|e| PickerError::Other(format!("JNI attach failed: {}", e)))?;

    let activity = get_activity_instance(&mut env, config)?;
    log::debug!("Calling MainActivity.{}", method);
    env.call_method(&activity, method, "()V", &[])
        .map_err(|e| PickerError::PermissionDenied(format!("{} failed: {}", method, e)))?;
    Ok(())
}

#[cfg(not(target_os = "android"))]
fn launch(_config: &AndroidPickerConfig, method: &str) -> Result<(), PickerError> {
    Err(PickerError::PlatformNotSupported(format!(
        "{} is not available on this platform",
        method
    )))
}

#[cfg(target_os = "android")]
fn optional_string(env: &mut JNIEnv, value: &JString) -> Option<String> {
    if value.is_null() {
        return None;
    }
    env.get_string(value).ok().map(Into::into)
}

/// `MainActivity.onCaptureResult(path: String?, error: String?)`
#[cfg(target_os = "android")]
#[no_mangle]
pub extern "system" fn Java_dev_unsplashgallery_app_MainActivity_onCaptureResult(
    mut env: JNIEnv,
    _class: JClass,
    path: JString,
    error: JString,
) {
    let result = match (
        optional_string(&mut env, &path),
        optional_string(&mut env, &error),
    ) {
        (_, Some(err)) => Err(PickerError::Other(err)),
        (Some(path), None) => Ok(PathBuf::from(path)),
        (None, None) => Err(PickerError::Cancelled("no photo taken".to_string())),
    };
    complete_capture(result);
}

/// `MainActivity.onImagesPicked(uris: String?, error: String?)`, uris newline-joined
#[cfg(target_os = "android")]
#[no_mangle]
pub extern "system" fn Java_dev_unsplashgallery_app_MainActivity_onImagesPicked(
    mut env: JNIEnv,
    _class: JClass,
    uris: JString,
    error: JString,
) {
    let result = match (
        optional_string(&mut env, &uris),
        optional_string(&mut env, &error),
    ) {
        (_, Some(err)) => Err(PickerError::Other(err)),
        (Some(combined), None) => Ok(parse_picked(&combined)),
        (None, None) => Ok(Vec::new()),
    };
    complete_pick(result);
}
