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

//! The `command_protocol!` macro: declares a closed tag/payload set.

/// Declares a command-buffer protocol: a tag enum plus the static
/// tag-to-payload mapping and the generated dispatch/visit routines.
///
/// ```rust
/// use bytemuck::{Pod, Zeroable};
/// use keel_core::command::{Command, CommandBuffer};
///
/// #[derive(Debug, Clone, Copy, Pod, Zeroable)]
/// #[repr(C)]
/// pub struct Resize { pub width: u32, pub height: u32 }
///
/// impl Command for Resize {
///     fn execute(self) { /* apply the resize */ }
/// }
///
/// keel_core::command_protocol! {
///     /// Commands accepted by the window thread.
///     pub protocol WindowCmd {
///         1 => Resize(Resize),
///     }
/// }
///
/// let mut buffer: CommandBuffer<WindowCmd> = CommandBuffer::new();
/// buffer.push(Resize { width: 800, height: 600 });
/// WindowCmd::dispatch(&mut buffer);
/// ```
///
/// Rules, enforced by the generated code:
/// - tag raw values start at 1 and must be unique; raw `0` is the
///   reserved `None` end-of-stream marker and cannot be declared,
/// - every payload must be [`bytemuck::Pod`] and fit in a chunk
///   (checked at compile time against the default chunk size),
/// - `dispatch` requires every payload to implement
///   [`Command`](crate::command::Command); `visit` requires the
///   visitor to implement [`Visit<T>`](crate::command::Visit) for
///   every payload. A tag without a matching arm cannot exist: the
///   generated match is closed over the declared set.
#[macro_export]
macro_rules! command_protocol {
    (
        $(#[$attr:meta])*
        $vis:vis protocol $name:ident {
            $(
                $(#[$variant_attr:meta])*
                $raw:literal => $variant:ident($payload:ty)
            ),+ $(,)?
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u16)]
        $vis enum $name {
            /// Reserved end-of-stream marker.
            None = 0,
            $(
                $(#[$variant_attr])*
                $variant = $raw,
            )+
        }

        impl $crate::command::CommandTag for $name {
            const NONE: Self = $name::None;

            fn to_raw(self) -> u16 {
                self as u16
            }

            fn from_raw(raw: u16) -> Option<Self> {
                match raw {
                    0 => Some($name::None),
                    $( $raw => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        $(
            impl $crate::command::CommandRecord<$name> for $payload {
                const TAG: $name = $name::$variant;
            }

            const _: () = assert!(
                ::core::mem::size_of::<$payload>() <= $crate::command::DEFAULT_CHUNK_SIZE,
                "command payload larger than a chunk"
            );
        )+

        impl $name {
            /// Rewinds `buffer`, then executes every record in log
            /// order via its `Command` impl.
            $vis fn dispatch<const CHUNK_SIZE: usize>(
                buffer: &mut $crate::command::CommandBuffer<Self, CHUNK_SIZE>,
            )
            where
                $( $payload: $crate::command::Command, )+
            {
                buffer.rewind_read_head();
                loop {
                    match buffer.read_next() {
                        $name::None => break,
                        $(
                            $name::$variant => {
                                let Some(record) = buffer.read::<$payload>() else {
                                    break;
                                };
                                $crate::command::Command::execute(record);
                            }
                        )+
                    }
                }
            }

            /// Rewinds `buffer`, then hands every record to `visitor`
            /// in log order, selecting the `Visit` impl by tag.
            $vis fn visit<V, const CHUNK_SIZE: usize>(
                buffer: &mut $crate::command::CommandBuffer<Self, CHUNK_SIZE>,
                visitor: &mut V,
            )
            where
                $( V: $crate::command::Visit<$payload>, )+
            {
                buffer.rewind_read_head();
                loop {
                    match buffer.read_next() {
                        $name::None => break,
                        $(
                            $name::$variant => {
                                let Some(record) = buffer.read::<$payload>() else {
                                    break;
                                };
                                <V as $crate::command::Visit<$payload>>::visit(visitor, record);
                            }
                        )+
                    }
                }
            }
        }
    };
}
