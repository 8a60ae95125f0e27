pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown property `{0}`")]
    UnknownProperty(String),

    #[error("property `{0}` has no value named `{1}`")]
    UnknownValue(String, String),
}
