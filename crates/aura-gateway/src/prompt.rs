//! Fixed instruction text and response schema.

use aura_core::Pose;
use serde_json::{json, Value};

pub const SYSTEM_INSTRUCTION: &str = "You are AURA-9, a facial recognition security core. \
You are highly sophisticated at detecting micro-facial differences. \
You are suspicious of all login attempts. \
Be extremely detailed in your match percentage.";

/// Label preceding the live image.
pub const CURRENT_SCAN_LABEL: &str = "IMAGE: CURRENT_SCAN";

/// Label preceding the enrollment reference for `pose`.
pub fn reference_label(pose: Pose) -> String {
    format!("IMAGE: ENROLLMENT_REFERENCE_{}", pose.label())
}

/// Task text naming the subject. The identifier is quoted and escaped.
pub fn task_text(identifier: &str) -> String {
    format!(
        "FACIAL RECOGNITION PROTOCOL AURA-9:\n\
         Subject: {identifier:?}\n\
         \n\
         TASK: Compare the \"CURRENT_SCAN\" image against the \"ENROLLMENT_REFERENCE\" images (Front, Left, Right).\n\
         \n\
         CRITICAL EVALUATION STEPS:\n\
         1. Identify the person in the Enrollment Reference photos.\n\
         2. Determine if the person in the \"CURRENT_SCAN\" is the EXACT SAME person.\n\
         3. Check for \"Liveness\": ensure the current scan is not a photo of a photo or a non-human object (such as a mask).\n\
         4. If it is a match, set status to 'AUTHORIZED'.\n\
         5. If the person looks different or the scan is suspicious, set status to 'DENIED'.\n\
         6. Provide a clinical analysis of the facial mesh comparison."
    )
}

/// JSON schema the model must answer with.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "status": { "type": "STRING", "enum": ["AUTHORIZED", "DENIED"] },
            "message": { "type": "STRING" },
            "threatLevel": { "type": "STRING", "enum": ["LOW", "MEDIUM", "HIGH"] },
            "biometricMatch": { "type": "NUMBER" }
        },
        "required": ["status", "message", "threatLevel", "biometricMatch"]
    })
}
