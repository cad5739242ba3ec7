//! CLI command implementations.

pub mod generate;
pub mod init;
pub mod inspect;
pub mod list;

/// Metadata shared by the command tests.
#[cfg(test)]
pub(crate) const FIXTURE: &str = r#"
[metadata]
scope = "win32"

[[namespaces]]
name = "Win32.Foundation"

[[namespaces.typedefs]]
name = "BOOL"
underlying = "int32_t"

[[namespaces.typedefs]]
name = "HANDLE"
underlying = "intptr_t"
release-with = "CloseHandle"
invalid-values = [0, -1]

[[namespaces.typedefs]]
name = "PCWSTR"
underlying = "const wchar_t*"
kind = "wide-string"

[[namespaces.functions]]
name = "CloseHandle"
library = "KERNEL32"
returns = "BOOL"
set-last-error = true

[[namespaces.functions.params]]
name = "hObject"
type = "HANDLE"
flags = ["in"]

[[namespaces.constants]]
name = "MAX_PATH"
type = "uint32_t"
value = 260

[[namespaces]]
name = "Win32.Storage"

[[namespaces.functions]]
name = "CreateFileW"
library = "KERNEL32"
returns = "HANDLE"

[[namespaces.functions.params]]
name = "lpFileName"
type = "PCWSTR"
flags = ["in"]

[[namespaces.functions.params]]
name = "dwDesiredAccess"
type = "uint32_t"
flags = ["in"]

[[namespaces.functions.params]]
name = "hTemplateFile"
type = "HANDLE"
flags = ["in", "optional"]
"#;
