/// Obscures secret values before they reach a store, and reveals them on read
pub trait SecretCodec: Send + Sync {
    fn obscure(&self, value: &str) -> String;

    fn reveal(&self, value: &str) -> Result<String, String>;
}

/// Stores secrets as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCodec;

impl SecretCodec for IdentityCodec {
    fn obscure(&self, value: &str) -> String {
        value.to_string()
    }

    fn reveal(&self, value: &str) -> Result<String, String> {
        Ok(value.to_string())
    }
}
