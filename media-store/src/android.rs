//! Android bindings: the device's MediaStore through `ContentResolver`, and the
//! SDK level check that picks the storage regime.

use crate::index::{image_uri, like_prefix_pattern, IndexError, MediaIndex, IMAGES_CONTENT_URI};
use crate::models::{IndexRow, NewEntry, QueryFilter, StorageRegime};
use jni::objects::{GlobalRef, JObject, JObjectArray, JString, JValue};
use jni::{JNIEnv, JavaVM};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

pub(crate) fn java_vm() -> Result<JavaVM, String> {
    let vm_ptr = ndk_context::android_context().vm() as *mut jni::sys::JavaVM;
    unsafe { JavaVM::from_raw(vm_ptr) }.map_err(|e| format!("JavaVM failed: {}", e))
}

fn app_context<'a>() -> JObject<'a> {
    unsafe { JObject::from_raw(ndk_context::android_context().context() as jni::sys::jobject) }
}

/// Turns a failed JNI call into an index error, consuming any pending Java exception
fn describe_failure(env: &mut JNIEnv, err: jni::errors::Error) -> IndexError {
    if !matches!(err, jni::errors::Error::JavaException) {
        return IndexError::Platform(err.to_string());
    }

    let throwable = match env.exception_occurred() {
        Ok(t) => t,
        Err(e) => return IndexError::Platform(e.to_string()),
    };
    let _ = env.exception_clear();

    let message = env
        .call_method(&throwable, "toString", "()Ljava/lang/String;", &[])
        .and_then(|v| v.l())
        .ok()
        .and_then(|obj| {
            let s = JString::from(obj);
            env.get_string(&s).ok().map(String::from)
        })
        .unwrap_or_else(|| "Java exception".to_string());

    if env
        .is_instance_of(&throwable, "java/lang/SecurityException")
        .unwrap_or(false)
    {
        IndexError::PermissionDenied(message)
    } else if env
        .is_instance_of(&throwable, "java/io/FileNotFoundException")
        .unwrap_or(false)
    {
        IndexError::NotFound(message)
    } else {
        IndexError::Platform(message)
    }
}

fn run<R>(
    vm: &JavaVM,
    op: impl for<'l> FnOnce(&mut JNIEnv<'l>) -> jni::errors::Result<R>,
) -> Result<R, IndexError> {
    let mut env = vm
        .attach_current_thread_permanently()
        .map_err(|e| IndexError::Platform(format!("JNI attach failed: {}", e)))?;
    let result = env.with_local_frame(32, |env| op(env));
    result.map_err(|e| describe_failure(&mut env, e))
}

/// Reads `Build.VERSION.SDK_INT`
pub fn sdk_int() -> Result<i32, IndexError> {
    let vm = java_vm().map_err(IndexError::Platform)?;
    run(&vm, |env| {
        env.get_static_field("android/os/Build$VERSION", "SDK_INT", "I")?
            .i()
    })
}

/// Storage regime of the running device; scoped when the check fails
pub fn probe_regime() -> StorageRegime {
    match sdk_int() {
        Ok(sdk) => {
            log::info!("Android SDK level {}", sdk);
            StorageRegime::from_sdk_int(sdk)
        }
        Err(e) => {
            log::warn!("SDK level check failed, assuming scoped storage: {}", e);
            StorageRegime::ModernScoped
        }
    }
}

fn parse_uri<'l>(env: &mut JNIEnv<'l>, uri: &str) -> jni::errors::Result<JObject<'l>> {
    let s = env.new_string(uri)?;
    env.call_static_method(
        "android/net/Uri",
        "parse",
        "(Ljava/lang/String;)Landroid/net/Uri;",
        &[JValue::Object(&s)],
    )?
    .l()
}

fn content_resolver<'l>(env: &mut JNIEnv<'l>) -> jni::errors::Result<JObject<'l>> {
    let context = app_context();
    env.call_method(
        &context,
        "getContentResolver",
        "()Landroid/content/ContentResolver;",
        &[],
    )?
    .l()
}

fn string_array<'l>(env: &mut JNIEnv<'l>, items: &[&str]) -> jni::errors::Result<JObjectArray<'l>> {
    let array = env.new_object_array(items.len() as i32, "java/lang/String", JObject::null())?;
    for (i, item) in items.iter().enumerate() {
        let s = env.new_string(item)?;
        env.set_object_array_element(&array, i as i32, &s)?;
    }
    Ok(array)
}

fn put_string(env: &mut JNIEnv, values: &JObject, key: &str, value: &str) -> jni::errors::Result<()> {
    let k = env.new_string(key)?;
    let v = env.new_string(value)?;
    env.call_method(
        values,
        "put",
        "(Ljava/lang/String;Ljava/lang/String;)V",
        &[JValue::Object(&k), JValue::Object(&v)],
    )?;
    Ok(())
}

fn put_int(env: &mut JNIEnv, values: &JObject, key: &str, value: i32) -> jni::errors::Result<()> {
    let k = env.new_string(key)?;
    let boxed = env
        .call_static_method(
            "java/lang/Integer",
            "valueOf",
            "(I)Ljava/lang/Integer;",
            &[JValue::Int(value)],
        )?
        .l()?;
    env.call_method(
        values,
        "put",
        "(Ljava/lang/String;Ljava/lang/Integer;)V",
        &[JValue::Object(&k), JValue::Object(&boxed)],
    )?;
    Ok(())
}

fn column_index(env: &mut JNIEnv, cursor: &JObject, name: &str) -> jni::errors::Result<i32> {
    let n = env.new_string(name)?;
    env.call_method(
        cursor,
        "getColumnIndex",
        "(Ljava/lang/String;)I",
        &[JValue::Object(&n)],
    )?
    .i()
}

fn cursor_long(env: &mut JNIEnv, cursor: &JObject, column: i32) -> jni::errors::Result<Option<i64>> {
    if column < 0 || env.call_method(cursor, "isNull", "(I)Z", &[JValue::Int(column)])?.z()? {
        return Ok(None);
    }
    Ok(Some(
        env.call_method(cursor, "getLong", "(I)J", &[JValue::Int(column)])?
            .j()?,
    ))
}

fn cursor_string(
    env: &mut JNIEnv,
    cursor: &JObject,
    column: i32,
) -> jni::errors::Result<Option<String>> {
    if column < 0 {
        return Ok(None);
    }
    let obj = env
        .call_method(
            cursor,
            "getString",
            "(I)Ljava/lang/String;",
            &[JValue::Int(column)],
        )?
        .l()?;
    if obj.is_null() {
        return Ok(None);
    }
    let s = JString::from(obj);
    let value: String = env.get_string(&s)?.into();
    env.delete_local_ref(s)?;
    Ok(Some(value))
}

/// The platform MediaStore, reached through the application's `ContentResolver`
pub struct ContentResolverIndex {
    vm: Arc<JavaVM>,
}

impl ContentResolverIndex {
    pub fn new() -> Result<Self, IndexError> {
        let vm = java_vm().map_err(IndexError::Platform)?;
        Ok(Self { vm: Arc::new(vm) })
    }
}

impl MediaIndex for ContentResolverIndex {
    fn query(&self, filter: &QueryFilter) -> Result<Vec<IndexRow>, IndexError> {
        // relative_path does not exist before API 29
        let (columns, selection, arg): (&[&str], &str, String) = match filter {
            QueryFilter::RelativePath(path) => (
                &["_id", "_display_name", "relative_path", "_data", "mime_type", "_size", "date_added"],
                "relative_path = ?",
                path.clone(),
            ),
            QueryFilter::DataPrefix(prefix) => (
                &["_id", "_display_name", "_data", "mime_type", "_size", "date_added"],
                "_data LIKE ? ESCAPE '\\'",
                like_prefix_pattern(prefix),
            ),
        };

        run(&self.vm, |env| {
            let resolver = content_resolver(env)?;
            let collection = parse_uri(env, IMAGES_CONTENT_URI)?;
            let projection = string_array(env, columns)?;
            let selection = env.new_string(selection)?;
            let args = string_array(env, &[arg.as_str()])?;
            let order = env.new_string("date_added DESC")?;

            let cursor = env
                .call_method(
                    &resolver,
                    "query",
                    "(Landroid/net/Uri;[Ljava/lang/String;Ljava/lang/String;[Ljava/lang/String;Ljava/lang/String;)Landroid/database/Cursor;",
                    &[
                        JValue::Object(&collection),
                        JValue::Object(&projection),
                        JValue::Object(&selection),
                        JValue::Object(&args),
                        JValue::Object(&order),
                    ],
                )?
                .l()?;
            if cursor.is_null() {
                return Ok(Vec::new());
            }

            let id_col = column_index(env, &cursor, "_id")?;
            let name_col = column_index(env, &cursor, "_display_name")?;
            let rel_col = column_index(env, &cursor, "relative_path")?;
            let data_col = column_index(env, &cursor, "_data")?;
            let mime_col = column_index(env, &cursor, "mime_type")?;
            let size_col = column_index(env, &cursor, "_size")?;
            let date_col = column_index(env, &cursor, "date_added")?;

            let mut rows = Vec::new();
            while env.call_method(&cursor, "moveToNext", "()Z", &[])?.z()? {
                // one frame per row keeps the local reference table flat
                let row = env.with_local_frame(8, |env| -> jni::errors::Result<IndexRow> {
                    let id = cursor_long(env, &cursor, id_col)?;
                    Ok(IndexRow {
                        uri: id.map(image_uri).unwrap_or_default(),
                        id,
                        display_name: cursor_string(env, &cursor, name_col)?,
                        relative_path: cursor_string(env, &cursor, rel_col)?,
                        data: cursor_string(env, &cursor, data_col)?,
                        mime_type: cursor_string(env, &cursor, mime_col)?,
                        size: cursor_long(env, &cursor, size_col)?,
                        // MediaStore stores seconds
                        date_added: cursor_long(env, &cursor, date_col)?.map(|s| s * 1000),
                    })
                })?;
                rows.push(row);
            }
            env.call_method(&cursor, "close", "()V", &[])?;
            Ok(rows)
        })
    }

    fn insert(&self, entry: &NewEntry) -> Result<String, IndexError> {
        let uri = run(&self.vm, |env| {
            let values = env.new_object("android/content/ContentValues", "()V", &[])?;
            put_string(env, &values, "_display_name", &entry.display_name)?;
            put_string(env, &values, "mime_type", &entry.mime_type)?;
            if let Some(relative_path) = &entry.relative_path {
                put_string(env, &values, "relative_path", relative_path)?;
            }
            if let Some(data) = &entry.data {
                put_string(env, &values, "_data", &data.to_string_lossy())?;
            }
            if entry.pending {
                put_int(env, &values, "is_pending", 1)?;
            }

            let resolver = content_resolver(env)?;
            let collection = parse_uri(env, IMAGES_CONTENT_URI)?;
            let created = env
                .call_method(
                    &resolver,
                    "insert",
                    "(Landroid/net/Uri;Landroid/content/ContentValues;)Landroid/net/Uri;",
                    &[JValue::Object(&collection), JValue::Object(&values)],
                )?
                .l()?;
            if created.is_null() {
                return Ok(None);
            }
            let text = env
                .call_method(&created, "toString", "()Ljava/lang/String;", &[])?
                .l()?;
            let text = JString::from(text);
            Ok(Some(String::from(env.get_string(&text)?)))
        })?;

        uri.ok_or_else(|| IndexError::Platform("insert returned no locator".to_string()))
    }

    fn finish_pending(&self, uri: &str) -> Result<usize, IndexError> {
        run(&self.vm, |env| {
            let values = env.new_object("android/content/ContentValues", "()V", &[])?;
            put_int(env, &values, "is_pending", 0)?;
            let resolver = content_resolver(env)?;
            let target = parse_uri(env, uri)?;
            let rows = env
                .call_method(
                    &resolver,
                    "update",
                    "(Landroid/net/Uri;Landroid/content/ContentValues;Ljava/lang/String;[Ljava/lang/String;)I",
                    &[
                        JValue::Object(&target),
                        JValue::Object(&values),
                        JValue::Object(&JObject::null()),
                        JValue::Object(&JObject::null()),
                    ],
                )?
                .i()?;
            Ok(rows.max(0) as usize)
        })
    }

    fn delete(&self, uri: &str) -> Result<usize, IndexError> {
        run(&self.vm, |env| {
            let resolver = content_resolver(env)?;
            let target = parse_uri(env, uri)?;
            let rows = env
                .call_method(
                    &resolver,
                    "delete",
                    "(Landroid/net/Uri;Ljava/lang/String;[Ljava/lang/String;)I",
                    &[
                        JValue::Object(&target),
                        JValue::Object(&JObject::null()),
                        JValue::Object(&JObject::null()),
                    ],
                )?
                .i()?;
            Ok(rows.max(0) as usize)
        })
    }

    fn open_read(&self, uri: &str) -> Result<Box<dyn Read + Send>, IndexError> {
        let stream = run(&self.vm, |env| {
            let resolver = content_resolver(env)?;
            let target = parse_uri(env, uri)?;
            let stream = env
                .call_method(
                    &resolver,
                    "openInputStream",
                    "(Landroid/net/Uri;)Ljava/io/InputStream;",
                    &[JValue::Object(&target)],
                )?
                .l()?;
            if stream.is_null() {
                return Ok(None);
            }
            Ok(Some(env.new_global_ref(stream)?))
        })?;

        match stream {
            Some(stream) => Ok(Box::new(JavaInputStream {
                vm: self.vm.clone(),
                stream,
            })),
            None => Err(IndexError::NotFound(uri.to_string())),
        }
    }

    fn open_write(&self, uri: &str) -> Result<Box<dyn Write + Send>, IndexError> {
        let stream = run(&self.vm, |env| {
            let resolver = content_resolver(env)?;
            let target = parse_uri(env, uri)?;
            let stream = env
                .call_method(
                    &resolver,
                    "openOutputStream",
                    "(Landroid/net/Uri;)Ljava/io/OutputStream;",
                    &[JValue::Object(&target)],
                )?
                .l()?;
            if stream.is_null() {
                return Ok(None);
            }
            Ok(Some(env.new_global_ref(stream)?))
        })?;

        match stream {
            Some(stream) => Ok(Box::new(JavaOutputStream {
                vm: self.vm.clone(),
                stream,
            })),
            None => Err(IndexError::NotFound(uri.to_string())),
        }
    }

    fn scan_file(&self, path: &Path, mime_type: &str) -> Result<(), IndexError> {
        let path = path.to_string_lossy().to_string();
        run(&self.vm, |env| {
            let context = app_context();
            let paths = string_array(env, &[path.as_str()])?;
            let mimes = string_array(env, &[mime_type])?;
            env.call_static_method(
                "android/media/MediaScannerConnection",
                "scanFile",
                "(Landroid/content/Context;[Ljava/lang/String;[Ljava/lang/String;Landroid/media/MediaScannerConnection$OnScanCompletedListener;)V",
                &[
                    JValue::Object(&context),
                    JValue::Object(&paths),
                    JValue::Object(&mimes),
                    JValue::Object(&JObject::null()),
                ],
            )?;
            Ok(())
        })
    }
}

fn to_io(err: IndexError) -> std::io::Error {
    match err {
        IndexError::Io(e) => e,
        other => std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
    }
}

/// `java.io.InputStream` as a Rust reader; closed on drop
struct JavaInputStream {
    vm: Arc<JavaVM>,
    stream: GlobalRef,
}

impl Read for JavaInputStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let stream = self.stream.clone();
        let chunk = run(&self.vm, |env| {
            let array = env.new_byte_array(buf.len() as i32)?;
            let n = env
                .call_method(stream.as_obj(), "read", "([B)I", &[JValue::Object(&array)])?
                .i()?;
            if n <= 0 {
                return Ok(Vec::new());
            }
            let mut bytes = env.convert_byte_array(&array)?;
            bytes.truncate(n as usize);
            Ok(bytes)
        })
        .map_err(to_io)?;

        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}

impl Drop for JavaInputStream {
    fn drop(&mut self) {
        let stream = self.stream.clone();
        if let Err(e) = run(&self.vm, |env| {
            env.call_method(stream.as_obj(), "close", "()V", &[])?;
            Ok(())
        }) {
            log::warn!("Closing input stream failed: {}", e);
        }
    }
}

/// `java.io.OutputStream` as a Rust writer; closed on drop
struct JavaOutputStream {
    vm: Arc<JavaVM>,
    stream: GlobalRef,
}

impl Write for JavaOutputStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let stream = self.stream.clone();
        run(&self.vm, |env| {
            let array = env.byte_array_from_slice(buf)?;
            env.call_method(stream.as_obj(), "write", "([B)V", &[JValue::Object(&array)])?;
            Ok(())
        })
        .map_err(to_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let stream = self.stream.clone();
        run(&self.vm, |env| {
            env.call_method(stream.as_obj(), "flush", "()V", &[])?;
            Ok(())
        })
        .map_err(to_io)
    }
}

impl Drop for JavaOutputStream {
    fn drop(&mut self) {
        let stream = self.stream.clone();
        if let Err(e) = run(&self.vm, |env| {
            env.call_method(stream.as_obj(), "close", "()V", &[])?;
            Ok(())
        }) {
            log::warn!("Closing output stream failed: {}", e);
        }
    }
}
