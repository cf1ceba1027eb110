use async_trait::async_trait;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::entities::{Environment, MerchantStatus};
use crate::framework::{DatabaseProcessor, MerchantStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Merchant {
    pub id: Uuid,
    pub name: String,
    pub status: MerchantStatus,
    pub mode: Environment,
    pub balance: Option<Decimal>,
    pub test_gateway_url: Option<String>,
    pub test_gateway_mid: Option<String>,
    pub test_gateway_key: Option<String>,
    pub test_gateway_api_key: Option<String>,
    pub live_gateway_url: Option<String>,
    pub live_gateway_mid: Option<String>,
    pub live_gateway_key: Option<String>,
    pub live_gateway_api_key: Option<String>,
}

/// One environment's gateway credentials, as stored (possibly incomplete).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredCredentials<'a> {
    pub url: Option<&'a str>,
    pub mid: Option<&'a str>,
    pub key: Option<&'a str>,
    pub api_key: Option<&'a str>,
}

impl Merchant {
    pub fn is_active(&self) -> bool {
        self.status == MerchantStatus::Active
    }

    pub fn credentials(&self, environment: Environment) -> StoredCredentials<'_> {
        match environment {
            Environment::Test => StoredCredentials {
                url: blank_to_none(&self.test_gateway_url),
                mid: blank_to_none(&self.test_gateway_mid),
                key: blank_to_none(&self.test_gateway_key),
                api_key: blank_to_none(&self.test_gateway_api_key),
            },
            Environment::Live => StoredCredentials {
                url: blank_to_none(&self.live_gateway_url),
                mid: blank_to_none(&self.live_gateway_mid),
                key: blank_to_none(&self.live_gateway_key),
                api_key: blank_to_none(&self.live_gateway_api_key),
            },
        }
    }

    /// Which environment a gateway MID belongs to. When both environments
    /// share the MID, the merchant's current mode wins.
    pub fn environment_of_mid(&self, mid: &str) -> Option<Environment> {
        let test = blank_to_none(&self.test_gateway_mid) == Some(mid);
        let live = blank_to_none(&self.live_gateway_mid) == Some(mid);
        match (test, live) {
            (true, true) => Some(self.mode),
            (true, false) => Some(Environment::Test),
            (false, true) => Some(Environment::Live),
            (false, false) => None,
        }
    }
}

fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

const SELECT_COLUMNS: &str = r#"
    id, name, status, mode, balance,
    test_gateway_url, test_gateway_mid, test_gateway_key, test_gateway_api_key,
    live_gateway_url, live_gateway_mid, live_gateway_key, live_gateway_api_key
"#;

#[derive(Debug, Clone)]
pub struct GetMerchantById {
    pub id: Uuid,
}

impl Processor<GetMerchantById> for DatabaseProcessor {
    type Output = Option<Merchant>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetMerchantById")]
    async fn process(&self, query: GetMerchantById) -> Result<Option<Merchant>, sqlx::Error> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM merchants WHERE id = $1");
        sqlx::query_as::<_, Merchant>(&sql)
            .bind(query.id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Find the merchant owning a gateway MID in either environment.
///
/// If several merchants share the MID, the lowest id wins.
pub struct GetMerchantByGatewayMid {
    pub mid: String,
}

impl Processor<GetMerchantByGatewayMid> for DatabaseProcessor {
    type Output = Option<Merchant>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetMerchantByGatewayMid")]
    async fn process(&self, query: GetMerchantByGatewayMid) -> Result<Option<Merchant>, sqlx::Error> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM merchants \
             WHERE test_gateway_mid = $1 OR live_gateway_mid = $1 \
             ORDER BY id LIMIT 1"
        );
        sqlx::query_as::<_, Merchant>(&sql)
            .bind(query.mid)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Store a merchant balance. Outputs `true` when the stored value changed.
pub struct UpdateMerchantBalance {
    pub id: Uuid,
    pub balance: Decimal,
}

impl Processor<UpdateMerchantBalance> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateMerchantBalance")]
    async fn process(&self, update: UpdateMerchantBalance) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE merchants SET balance = $2, updated_at = now()
            WHERE id = $1 AND balance IS DISTINCT FROM $2
            "#,
        )
        .bind(update.id)
        .bind(update.balance)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl MerchantStore for DatabaseProcessor {
    async fn find_merchant(&self, id: Uuid) -> Result<Option<Merchant>, StoreError> {
        Ok(self.process(GetMerchantById { id }).await?)
    }

    async fn find_merchant_by_gateway_mid(&self, mid: &str) -> Result<Option<Merchant>, StoreError> {
        Ok(self
            .process(GetMerchantByGatewayMid {
                mid: mid.to_string(),
            })
            .await?)
    }

    async fn update_merchant_balance(&self, id: Uuid, balance: Decimal) -> Result<bool, StoreError> {
        Ok(self.process(UpdateMerchantBalance { id, balance }).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::merchant;

    #[test]
    fn credentials_follow_environment_and_ignore_blanks() {
        let mut m = merchant();
        m.live_gateway_key = Some("  ".to_string());

        let test = m.credentials(Environment::Test);
        assert_eq!(test.mid, Some("TEST-MID"));
        assert_eq!(test.key, Some("test-key"));

        let live = m.credentials(Environment::Live);
        assert_eq!(live.mid, Some("LIVE-MID"));
        assert_eq!(live.key, None);
    }

    #[test]
    fn mid_resolves_to_its_environment() {
        let mut m = merchant();
        assert_eq!(m.environment_of_mid("TEST-MID"), Some(Environment::Test));
        assert_eq!(m.environment_of_mid("LIVE-MID"), Some(Environment::Live));
        assert_eq!(m.environment_of_mid("OTHER"), None);

        m.live_gateway_mid = Some("TEST-MID".to_string());
        m.mode = Environment::Live;
        assert_eq!(m.environment_of_mid("TEST-MID"), Some(Environment::Live));
    }
}
