mod cancellation;
mod errors;
mod generation_contract;

pub use cancellation::{AbortSignal, CancellationToken};
pub use errors::{ClientError, LlmError, LlmErrorCategory};
pub use generation_contract::{
    ErrorResponseBody, GENERATION_FAILED_MESSAGE, GenerateRequestBody, GenerateResponseBody,
    GenerationOutcome, ModelSelector, PROMPT_REQUIRED_MESSAGE, Prompt,
    UNSUPPORTED_MODEL_MESSAGE,
};
