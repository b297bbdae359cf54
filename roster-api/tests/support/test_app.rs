#![allow(dead_code)]

use actix_web::dev::ServerHandle;
use reqwest::multipart::{Form, Part};
use reqwest::{IntoUrl, RequestBuilder};
use roster::queue::memory::MemoryCommandQueue;
use roster::store::admin::memory::MemoryAdminStore;
use roster::store::notification::memory::MemoryNotificationStore;
use roster::store::staff::StaffStore;
use roster::store::staff::memory::MemoryStaffStore;
use roster::test_utils::auth::{admin_token, test_auth_config};
use roster::types::{NewStaff, StaffRecord};
use roster_api::config::{ApiConfig, ApplicationSettings};
use roster_api::startup::{Application, Backends};
use roster_config::shared::{IngestionConfig, PushConfig, QueueConfig, StorageConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// How long a test waits for the workers to reach an expected state.
const WORKER_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TestApp {
    pub address: String,
    pub push_url: String,
    pub api_client: reqwest::Client,
    pub token: String,
    pub staff_store: Arc<MemoryStaffStore>,
    pub admin_store: Arc<MemoryAdminStore>,
    server_handle: ServerHandle,
    app_handle: JoinHandle<anyhow::Result<()>>,
}

impl TestApp {
    fn get_authenticated<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.api_client.get(url).bearer_auth(&self.token)
    }

    fn post_authenticated<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.api_client.post(url).bearer_auth(&self.token)
    }

    fn patch_authenticated<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.api_client.patch(url).bearer_auth(&self.token)
    }

    fn delete_authenticated<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.api_client.delete(url).bearer_auth(&self.token)
    }

    pub async fn health_check(&self) -> reqwest::Response {
        self.api_client
            .get(format!("{}/", &self.address))
            .send()
            .await
            .expect("failed to execute request")
    }

    pub async fn metrics(&self) -> reqwest::Response {
        self.api_client
            .get(format!("{}/metrics", &self.address))
            .send()
            .await
            .expect("failed to execute request")
    }

    pub async fn read_identity(&self) -> reqwest::Response {
        self.get_authenticated(format!("{}/v1/auth/me", &self.address))
            .send()
            .await
            .expect("failed to execute request")
    }

    pub async fn read_identity_with_token(&self, token: Option<&str>) -> reqwest::Response {
        let request = self.api_client.get(format!("{}/v1/auth/me", &self.address));
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        request.send().await.expect("failed to execute request")
    }

    pub async fn add_staff(&self, staff: &serde_json::Value) -> reqwest::Response {
        self.post_authenticated(format!("{}/v1/staff/add", &self.address))
            .json(staff)
            .send()
            .await
            .expect("failed to execute request")
    }

    /// Posts `credentials` to the login route without a bearer token.
    pub async fn login(&self, credentials: &serde_json::Value) -> reqwest::Response {
        self.api_client
            .post(format!("{}/v1/auth/login", &self.address))
            .json(credentials)
            .send()
            .await
            .expect("failed to execute request")
    }

    /// Uploads `csv` as the `file` part of a multipart form.
    pub async fn add_staff_csv(&self, csv: impl Into<String>) -> reqwest::Response {
        let file = Part::text(csv.into())
            .file_name("staff.csv")
            .mime_str("text/csv")
            .expect("invalid mime type");

        self.upload_staff_form(Form::new().part("file", file)).await
    }

    pub async fn upload_staff_form(&self, form: Form) -> reqwest::Response {
        self.post_authenticated(format!("{}/v1/staff/add/csv", &self.address))
            .multipart(form)
            .send()
            .await
            .expect("failed to execute request")
    }

    pub async fn update_staff(&self, updates: &serde_json::Value) -> reqwest::Response {
        self.patch_authenticated(format!("{}/v1/staff/update", &self.address))
            .json(updates)
            .send()
            .await
            .expect("failed to execute request")
    }

    pub async fn remove_staff(&self, ids: &serde_json::Value) -> reqwest::Response {
        self.delete_authenticated(format!("{}/v1/staff/remove", &self.address))
            .json(ids)
            .send()
            .await
            .expect("failed to execute request")
    }

    pub async fn read_staff(&self, query: &str) -> reqwest::Response {
        self.get_authenticated(format!("{}/v1/staff/data{query}", &self.address))
            .send()
            .await
            .expect("failed to execute request")
    }

    pub async fn read_notifications(&self, query: &str) -> reqwest::Response {
        self.get_authenticated(format!("{}/v1/notifications{query}", &self.address))
            .send()
            .await
            .expect("failed to execute request")
    }

    pub async fn mark_notifications_read(
        &self,
        ids: Option<&serde_json::Value>,
    ) -> reqwest::Response {
        let request = self.patch_authenticated(format!("{}/v1/notifications/read", &self.address));
        let request = match ids {
            Some(ids) => request.json(ids),
            None => request,
        };

        request.send().await.expect("failed to execute request")
    }

    /// Inserts a record directly into the store, bypassing the queue.
    pub async fn seed_staff(
        &self,
        name: &str,
        position: &str,
        age: i32,
        salary: f64,
    ) -> StaffRecord {
        self.staff_store
            .create(NewStaff {
                name: name.to_string(),
                age,
                position: position.to_string(),
                salary,
            })
            .await
            .expect("failed to seed staff record")
    }

    /// Waits until the stored records satisfy `condition`.
    pub async fn wait_for_staff<F>(&self, mut condition: F) -> Vec<StaffRecord>
    where
        F: FnMut(&[StaffRecord]) -> bool,
    {
        let waited = timeout(WORKER_TIMEOUT, async {
            loop {
                let records = self.staff_store.records().await;
                if condition(&records) {
                    return records;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        waited.unwrap_or_else(|_| panic!("staff store did not reach the expected state"))
    }

    /// Stops the HTTP server and waits for the workers and the push server to drain.
    pub async fn shutdown(self) {
        self.server_handle.stop(true).await;
        self.app_handle
            .await
            .expect("application task panicked")
            .expect("application stopped with an error");
    }
}

pub async fn spawn_test_app() -> TestApp {
    let host = "127.0.0.1";
    let config = ApiConfig {
        application: ApplicationSettings {
            host: host.to_string(),
            port: 0,
        },
        storage: StorageConfig::Memory,
        queue: QueueConfig {
            concurrency: 2,
            poll_interval_ms: 20,
            ..QueueConfig::default()
        },
        ingestion: IngestionConfig::default(),
        auth: test_auth_config(),
        push: PushConfig {
            host: host.to_string(),
            port: 0,
            path: PushConfig::DEFAULT_PATH.to_string(),
            subscriber_buffer: 16,
        },
    };

    let staff_store = Arc::new(MemoryStaffStore::new());
    let admin_store = Arc::new(MemoryAdminStore::new());
    let backends = Backends {
        staff_store: staff_store.clone(),
        notification_store: Arc::new(MemoryNotificationStore::new()),
        admin_store: admin_store.clone(),
        queue: Arc::new(MemoryCommandQueue::new()),
    };

    let application = Application::build_with_backends(config, backends)
        .await
        .expect("failed to build application");
    let port = application.port();
    let push_addr = application.push_addr();
    let server_handle = application.server_handle();
    let app_handle = tokio::spawn(application.run_until_stopped());

    TestApp {
        address: format!("http://{host}:{port}"),
        push_url: format!("ws://{push_addr}{}", PushConfig::DEFAULT_PATH),
        api_client: reqwest::Client::new(),
        token: admin_token(),
        staff_store,
        admin_store,
        server_handle,
        app_handle,
    }
}
