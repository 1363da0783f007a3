// Copyright 2026 Daniel Pelikan
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

//! Bluetooth transport.
//!
//! Discovery and RFCOMM (Serial Port Profile) streams on top of BlueZ.

mod adapter;
mod rfcomm;

pub use adapter::BluetoothAdapter;
pub use rfcomm::{accept_one, map_bluer_error, RfcommTransport};
