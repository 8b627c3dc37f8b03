// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tally::Dispatcher;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub upload_dir: PathBuf,
    pub static_dir: PathBuf,
    pub knowledge_dir: PathBuf,
    pub index_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let var = |key: &str, default: &str| {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };
        Self {
            upload_dir: PathBuf::from(var("CFO_UPLOAD_DIR", "uploads")),
            static_dir: PathBuf::from(var("CFO_STATIC_DIR", "static")),
            knowledge_dir: PathBuf::from(var("CFO_KNOWLEDGE_DIR", "knowledge_base")),
            index_path: PathBuf::from(var("CFO_INDEX_PATH", "advisor_index.json")),
        }
    }
}

/// Maps session ids to the dataset uploaded within that session.
#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<HashMap<Uuid, PathBuf>>,
}

impl SessionStore {
    pub async fn bind(&self, session: Uuid, path: PathBuf) {
        self.inner.write().await.insert(session, path);
    }

    pub async fn get_dataset_path(&self, session: Uuid) -> Option<PathBuf> {
        self.inner.read().await.get(&session).cloned()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionStore>,
    pub config: Arc<AppConfig>,
}
