// Copyright 2026 keel contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Panic containment shared by the worker run loop, event emit passes,
//! and module hook wrappers.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Runs `f`, converting a panic into `Err` with a best-effort message.
///
/// Containment boundaries in this workspace (tasks, hooks, listeners)
/// treat panics and returned errors uniformly; this is the panic half.
pub fn contain<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| describe_panic(payload.as_ref()))
}

/// Best-effort rendering of a panic payload for logs and reports.
pub fn describe_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contain_passes_through_return_values() {
        assert_eq!(contain(|| 41 + 1), Ok(42));
    }

    #[test]
    fn contain_catches_str_panics() {
        let result = contain(|| -> u32 { panic!("boom") });
        assert_eq!(result, Err("boom".to_string()));
    }

    #[test]
    fn contain_catches_formatted_panics() {
        let result = contain(|| -> u32 { panic!("code {}", 7) });
        assert_eq!(result, Err("code 7".to_string()));
    }

    #[test]
    fn non_string_payloads_get_a_placeholder() {
        let result = contain(|| std::panic::panic_any(17u32));
        assert_eq!(result, Err("non-string panic payload".to_string()));
    }
}
