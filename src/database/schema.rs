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

//! Diesel schema for the task store.
//!
//! One table holds the whole engine state. SQLite storage conventions:
//! UUIDs are 16-byte BLOBs, timestamps are RFC3339 TEXT (UTC, fixed
//! microsecond precision so lexicographic order matches chronological
//! order), the payload is a JSON object serialized to TEXT.

diesel::table! {
    scheduled_tasks (id) {
        id -> Binary,
        task_type -> Text,
        task_name -> Text,
        payload -> Text,
        scheduled_time -> Text,
        status -> Text,
        priority -> Integer,
        retry_count -> Integer,
        max_retries -> Integer,
        last_error -> Nullable<Text>,
        locked_by -> Nullable<Binary>,
        locked_at -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}
