// Copyright 2025 Kirky.X
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

use crate::config::settings::HttpClientSettings;
use crate::domain::models::worker::Worker;
use crate::infrastructure::clients::ClientError;
use chrono::NaiveDate;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// 工作器服务客户端
///
/// 封装对远程工作器HTTP接口的全部调用：会话创建/查询/结束，
/// 抓取作业的启动/查询/取消。每个调用都携带目标工作器的API密钥。
#[derive(Clone)]
pub struct WorkerClient {
    /// HTTP客户端
    client: Client,
    /// 单个请求超时时间
    timeout: Duration,
}

/// 会话创建请求体
#[derive(Debug, Clone, Serialize)]
pub struct SessionCreateRequest {
    pub force_refresh: bool,
    pub proxy: ProxyConfig,
}

/// 会话使用的代理配置
#[derive(Debug, Clone, Serialize)]
pub struct ProxyConfig {
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// 会话创建响应体
#[derive(Debug, Clone, Deserialize)]
pub struct SessionCreateResponse {
    pub session_id: Option<String>,
    pub job_id: Option<String>,
}

impl SessionCreateResponse {
    /// 远程会话标识，部分工作器用job_id字段返回
    pub fn external_id(&self) -> Option<&str> {
        self.session_id.as_deref().or(self.job_id.as_deref())
    }
}

/// 会话状态响应体
///
/// 不同实现的工作器用不同字段报告阶段，这里全部兼容
#[derive(Debug, Clone, Deserialize)]
pub struct SessionStatusResponse {
    pub status: Option<String>,
    pub phase: Option<String>,
    pub progress: Option<SessionProgress>,
}

/// 会话状态响应中的进度信息
#[derive(Debug, Clone, Deserialize)]
pub struct SessionProgress {
    pub phase: Option<String>,
    pub ads_scraped: Option<i64>,
}

impl SessionStatusResponse {
    /// 提取原始阶段字符串
    ///
    /// 依次取phase、progress.phase、status，全部缺失时返回"unknown"
    pub fn raw_phase(&self) -> &str {
        self.phase
            .as_deref()
            .or_else(|| self.progress.as_ref().and_then(|p| p.phase.as_deref()))
            .or(self.status.as_deref())
            .unwrap_or("unknown")
    }
}

/// 抓取作业请求体
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeRequest {
    pub date_range: DateRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub languages: Vec<String>,
    pub sort_by: String,
    pub options: ScrapeOptions,
}

/// 抓取日期范围
#[derive(Debug, Clone, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// 抓取作业可调参数
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeOptions {
    pub max_ads: u32,
    pub batch_size: u32,
}

/// 抓取作业创建响应体
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeJobResponse {
    pub job_id: Option<String>,
}

/// 抓取作业状态响应体
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeStatusResponse {
    pub status: Option<String>,
    pub ads_scraped: Option<i64>,
    pub progress: Option<ScrapeProgress>,
}

/// 抓取作业状态响应中的进度信息
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeProgress {
    pub ads_scraped: Option<i64>,
}

impl ScrapeStatusResponse {
    /// 作业是否成功结束
    pub fn is_finished(&self) -> bool {
        matches!(self.status.as_deref(), Some("completed") | Some("done"))
    }

    /// 作业是否失败
    pub fn is_failed(&self) -> bool {
        matches!(self.status.as_deref(), Some("failed") | Some("error"))
    }

    /// 已抓取广告数量，兼容顶层和progress两种位置
    pub fn ads(&self) -> i64 {
        self.ads_scraped
            .or_else(|| self.progress.as_ref().and_then(|p| p.ads_scraped))
            .unwrap_or(0)
    }
}

impl WorkerClient {
    /// 创建新的工作器客户端实例
    ///
    /// # 参数
    ///
    /// * `settings` - 出站HTTP客户端配置
    ///
    /// # 返回值
    ///
    /// 返回新的工作器客户端实例
    pub fn new(settings: &HttpClientSettings) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("Orchestrs/0.1.0"),
        );
        Self {
            client: Client::builder().default_headers(headers).build().unwrap(),
            timeout: Duration::from_secs(settings.request_timeout),
        }
    }

    fn endpoint(&self, worker: &Worker, path: &str) -> Result<Url, ClientError> {
        let base = worker.url.trim_end_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, path))?)
    }

    /// 在工作器上创建会话
    ///
    /// # 参数
    ///
    /// * `worker` - 目标工作器
    /// * `request` - 会话创建请求
    ///
    /// # 返回值
    ///
    /// * `Ok(SessionCreateResponse)` - 创建成功
    /// * `Err(ClientError)` - 创建失败
    pub async fn create_session(
        &self,
        worker: &Worker,
        request: &SessionCreateRequest,
    ) -> Result<SessionCreateResponse, ClientError> {
        let response = self
            .client
            .post(self.endpoint(worker, "session")?)
            .header("x-api-key", &worker.api_key)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::UnexpectedStatus(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }

    /// 查询工作器上当前会话的状态
    pub async fn session_status(
        &self,
        worker: &Worker,
    ) -> Result<SessionStatusResponse, ClientError> {
        let response = self
            .client
            .get(self.endpoint(worker, "session/status")?)
            .header("x-api-key", &worker.api_key)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::UnexpectedStatus(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }

    /// 结束工作器上的当前会话
    pub async fn end_session(&self, worker: &Worker) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.endpoint(worker, "session")?)
            .header("x-api-key", &worker.api_key)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::UnexpectedStatus(response.status().as_u16()));
        }

        Ok(())
    }

    /// 启动抓取作业
    ///
    /// # 参数
    ///
    /// * `worker` - 目标工作器
    /// * `request` - 抓取作业请求
    ///
    /// # 返回值
    ///
    /// * `Ok(String)` - 远程作业ID
    /// * `Err(ClientError)` - 启动失败或响应缺少作业ID
    pub async fn start_scrape(
        &self,
        worker: &Worker,
        request: &ScrapeRequest,
    ) -> Result<String, ClientError> {
        let response = self
            .client
            .post(self.endpoint(worker, "scrape")?)
            .header("x-api-key", &worker.api_key)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::UnexpectedStatus(response.status().as_u16()));
        }

        let body: ScrapeJobResponse = response.json().await?;
        body.job_id
            .ok_or_else(|| ClientError::InvalidResponse("no job_id returned".to_string()))
    }

    /// 查询抓取作业状态
    pub async fn scrape_status(
        &self,
        worker: &Worker,
        job_id: &str,
    ) -> Result<ScrapeStatusResponse, ClientError> {
        let mut url = self.endpoint(worker, "scrape/status")?;
        url.query_pairs_mut().append_pair("job_id", job_id);

        let response = self
            .client
            .get(url)
            .header("x-api-key", &worker.api_key)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::UnexpectedStatus(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }

    /// 取消抓取作业
    pub async fn cancel_scrape(&self, worker: &Worker, job_id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.endpoint(worker, &format!("scrape/{}", job_id))?)
            .header("x-api-key", &worker.api_key)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::UnexpectedStatus(response.status().as_u16()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::session::PhaseClass;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn worker_for(server: &MockServer) -> Worker {
        Worker {
            id: Uuid::new_v4(),
            name: "w1".to_string(),
            url: server.uri(),
            api_key: "secret".to_string(),
            storage_domain: None,
            status: Default::default(),
            active: true,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn client() -> WorkerClient {
        WorkerClient::new(&HttpClientSettings { request_timeout: 5 })
    }

    #[tokio::test]
    async fn create_session_posts_proxy_credentials() {
        let server = MockServer::start().await;
        let request = SessionCreateRequest {
            force_refresh: true,
            proxy: ProxyConfig {
                server: "10.0.0.1:8080".to_string(),
                username: Some("user".to_string()),
                password: Some("pass".to_string()),
            },
        };

        Mock::given(method("POST"))
            .and(path("/session"))
            .and(header("x-api-key", "secret"))
            .and(body_json(json!({
                "force_refresh": true,
                "proxy": {"server": "10.0.0.1:8080", "username": "user", "password": "pass"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_id": "abc"})))
            .expect(1)
            .mount(&server)
            .await;

        let response = client()
            .create_session(&worker_for(&server), &request)
            .await
            .unwrap();
        assert_eq!(response.external_id(), Some("abc"));
    }

    #[tokio::test]
    async fn create_session_maps_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let request = SessionCreateRequest {
            force_refresh: true,
            proxy: ProxyConfig {
                server: "10.0.0.1:8080".to_string(),
                username: None,
                password: None,
            },
        };

        let err = client()
            .create_session(&worker_for(&server), &request)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedStatus(502)));
    }

    #[tokio::test]
    async fn session_status_phase_falls_back_through_fields() {
        let from_phase: SessionStatusResponse =
            serde_json::from_value(json!({"phase": "warming_up"})).unwrap();
        assert_eq!(from_phase.raw_phase(), "warming_up");

        let from_progress: SessionStatusResponse =
            serde_json::from_value(json!({"progress": {"phase": "connecting"}})).unwrap();
        assert_eq!(from_progress.raw_phase(), "connecting");

        let from_status: SessionStatusResponse =
            serde_json::from_value(json!({"status": "ready"})).unwrap();
        assert_eq!(from_status.raw_phase(), "ready");
        assert_eq!(PhaseClass::classify(from_status.raw_phase()), PhaseClass::Ready);

        let empty: SessionStatusResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.raw_phase(), "unknown");
        assert_eq!(PhaseClass::classify(empty.raw_phase()), PhaseClass::InProgress);
    }

    #[tokio::test]
    async fn start_scrape_requires_job_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/scrape"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let request = ScrapeRequest {
            date_range: DateRange {
                start: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end: chrono::NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
            },
            format: None,
            languages: vec!["en".to_string()],
            sort_by: "qtd_ads".to_string(),
            options: ScrapeOptions {
                max_ads: 1000,
                batch_size: 100,
            },
        };

        let err = client()
            .start_scrape(&worker_for(&server), &request)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn scrape_status_reads_ads_from_either_location() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scrape/status"))
            .and(query_param("job_id", "j1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "completed",
                "progress": {"ads_scraped": 42}
            })))
            .mount(&server)
            .await;

        let status = client()
            .scrape_status(&worker_for(&server), "j1")
            .await
            .unwrap();
        assert!(status.is_finished());
        assert!(!status.is_failed());
        assert_eq!(status.ads(), 42);
    }
}
