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
use crate::domain::models::writer::Writer;
use crate::infrastructure::clients::ClientError;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// 写入器服务客户端
///
/// 封装对远程写入器HTTP接口的调用：提交处理作业与查询作业状态
#[derive(Clone)]
pub struct WriterClient {
    /// HTTP客户端
    client: Client,
    /// 单个请求超时时间
    timeout: Duration,
}

/// 处理作业请求体
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRequest {
    pub data_url: String,
    pub mission_id: Uuid,
}

/// 处理作业创建响应体
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessJobResponse {
    pub job_id: Option<String>,
}

/// 处理作业状态响应体
#[derive(Debug, Clone, Deserialize)]
pub struct WriterStatusResponse {
    pub status: Option<String>,
}

impl WriterStatusResponse {
    /// 作业是否成功结束
    pub fn is_finished(&self) -> bool {
        matches!(self.status.as_deref(), Some("completed") | Some("done"))
    }

    /// 作业是否失败
    pub fn is_failed(&self) -> bool {
        matches!(self.status.as_deref(), Some("failed") | Some("error"))
    }
}

impl WriterClient {
    /// 创建新的写入器客户端实例
    ///
    /// # 参数
    ///
    /// * `settings` - 出站HTTP客户端配置
    ///
    /// # 返回值
    ///
    /// 返回新的写入器客户端实例
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

    fn endpoint(&self, writer: &Writer, path: &str) -> Result<Url, ClientError> {
        let base = writer.url.trim_end_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, path))?)
    }

    /// 提交处理作业
    ///
    /// # 参数
    ///
    /// * `writer` - 目标写入器
    /// * `data_url` - 抓取结果数据URL
    /// * `mission_id` - 任务ID
    ///
    /// # 返回值
    ///
    /// * `Ok(String)` - 远程作业ID
    /// * `Err(ClientError)` - 提交失败或响应缺少作业ID
    pub async fn process(
        &self,
        writer: &Writer,
        data_url: &str,
        mission_id: Uuid,
    ) -> Result<String, ClientError> {
        let request = ProcessRequest {
            data_url: data_url.to_string(),
            mission_id,
        };

        let response = self
            .client
            .post(self.endpoint(writer, "process")?)
            .header("x-api-key", &writer.api_key)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::UnexpectedStatus(response.status().as_u16()));
        }

        let body: ProcessJobResponse = response.json().await?;
        body.job_id
            .ok_or_else(|| ClientError::InvalidResponse("no job_id returned".to_string()))
    }

    /// 查询处理作业状态
    pub async fn job_status(
        &self,
        writer: &Writer,
        job_id: &str,
    ) -> Result<WriterStatusResponse, ClientError> {
        let mut url = self.endpoint(writer, "status")?;
        url.query_pairs_mut().append_pair("job_id", job_id);

        let response = self
            .client
            .get(url)
            .header("x-api-key", &writer.api_key)
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::UnexpectedStatus(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn writer_for(server: &MockServer) -> Writer {
        Writer {
            id: Uuid::new_v4(),
            name: "wr1".to_string(),
            url: server.uri(),
            api_key: "secret".to_string(),
            active: true,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn client() -> WriterClient {
        WriterClient::new(&HttpClientSettings { request_timeout: 5 })
    }

    #[tokio::test]
    async fn process_returns_job_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/process"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"job_id": "wj-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let job_id = client()
            .process(&writer_for(&server), "https://data/1.json", Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(job_id, "wj-1");
    }

    #[tokio::test]
    async fn job_status_buckets_terminal_states() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .and(query_param("job_id", "wj-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "failed"})))
            .mount(&server)
            .await;

        let status = client()
            .job_status(&writer_for(&server), "wj-1")
            .await
            .unwrap();
        assert!(status.is_failed());
        assert!(!status.is_finished());
    }
}
