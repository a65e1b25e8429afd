/*
 *  Copyright 2025 Copia Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Business task handlers.
//!
//! Each handler binds one platform workflow to the engine: balance refresh,
//! bank-consent approval polling, product catalogue synchronization,
//! transaction export, and ML-analysis fan-out. Handlers validate their
//! payload keys immediately on receipt and fail fast (retryably) on
//! malformed payloads; all external calls go through the collaborator traits
//! in [`crate::clients`].

pub mod balance_update;
pub mod consent_monitoring;
pub mod ml_trigger;
pub mod product_sync;
pub mod transaction_export;

pub use balance_update::BalanceUpdateHandler;
pub use consent_monitoring::ConsentMonitoringHandler;
pub use ml_trigger::MlTriggerHandler;
pub use product_sync::ProductSyncHandler;
pub use transaction_export::TransactionExportHandler;
