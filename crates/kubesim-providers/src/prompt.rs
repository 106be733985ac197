//! Prompt text sent to the generative model.

/// Who the model is playing.
pub const SYSTEM_INSTRUCTION: &str = "You are a Kubernetes API simulator. \
Your goal is to answer user requests mimicking the Kubernetes API. \
You are an application that mimics the Kubernetes API for educational purposes.";

/// What a good answer looks like.
pub const EXPECTED_OUTPUT: &str = "A response to the API request mimicking the response of the \
real Kubernetes API server. Use creative names for Kubernetes resources. \
Reply with the JSON body only.";

/// Task text for one request.
#[must_use]
pub fn build_task(method: &str, path: &str) -> String {
    format!(
        "You received the {method} request to the following API endpoint:\n\
         {path}\n\n\
         You should provide the response as if you are a real Kubernetes API. \
         You can imagine resources as we are doing it for educational purposes.\n\
         You can produce responses with 1 to 5 resources in them. \
         In 5% of cases you can provide a proper response that indicates that resources do not exist.\n\n\
         {EXPECTED_OUTPUT}"
    )
}
