// Built-in prompt templates, keyed by template id.
// Placeholders are `{name}`; `PromptRegistry::render` fills them in one pass,
// so braces inside substituted text are never re-expanded.
// Chunked analysis looks up `<use_case>.section` and `<use_case>.consolidation`.

pub const MEDICAL_REPORT: &str = "\
Analyze this medical report concisely. Provide:

**KEY FINDINGS:** (2-3 main points)
**CONDITIONS:** (list medical conditions found)
**MEDICATIONS:** (list any medications mentioned)
**RECOMMENDATIONS:** (important follow-up actions)
**CRITICAL ALERTS:** (urgent items requiring attention)

Medical Text:
{document}

Keep response under 500 words and be specific:";

pub const MEDICAL_REPORT_SECTION: &str = "\
Analyze part {section_index} of {section_count} of a medical report concisely. Provide:

**KEY FINDINGS:** (2-3 main points)
**CONDITIONS:** (list medical conditions found)
**MEDICATIONS:** (list any medications mentioned)
**RECOMMENDATIONS:** (important follow-up actions)
**CRITICAL ALERTS:** (urgent items requiring attention)

Medical Text:
{document}

Keep response under 500 words and be specific:";

pub const MEDICAL_REPORT_CONSOLIDATION: &str = "\
Summarize these medical report analyses into one cohesive report:

{report}

Provide final consolidated:
**OVERALL SUMMARY:**
**ALL CONDITIONS FOUND:**
**ALL MEDICATIONS:**
**PRIORITY RECOMMENDATIONS:**
**CRITICAL ITEMS:**";

pub const GENERAL_SUMMARY: &str = "\
Summarize the following document. List the main points, any figures or dates \
that matter, and open questions a reader should follow up on.

Document:
{document}";

pub const GENERAL_SUMMARY_SECTION: &str = "\
Summarize part {section_index} of {section_count} of a longer document. List the \
main points and any figures or dates that matter.

Document part:
{document}";

pub const GENERAL_SUMMARY_CONSOLIDATION: &str = "\
Merge these section summaries into one coherent summary of the whole document. \
Remove repetition and keep the most important points first.

{report}";

pub const RESUME_REVIEW: &str = r#"As an expert HR professional and resume reviewer, analyze the following resume and provide a comprehensive evaluation.

Resume Content:
{document}

Please provide your analysis in the following JSON format:
{
    "overall_rating": <score out of 10>,
    "rating_explanation": "<brief explanation of the rating>",
    "strengths": ["<strength 1>", "<strength 2>", "<strength 3>"],
    "areas_for_improvement": ["<improvement area 1>", "<improvement area 2>", "<improvement area 3>", "<improvement area 4>", "<improvement area 5>"],
    "specific_suggestions": ["<specific actionable suggestion 1>", "<specific actionable suggestion 2>", "<specific actionable suggestion 3>"],
    "keywords_missing": ["<missing keyword 1>", "<missing keyword 2>", "<missing keyword 3>"],
    "format_feedback": "<feedback on resume format and structure>",
    "summary": "<overall summary of the resume>"
}

Focus on:
1. Content quality and relevance
2. Professional formatting and structure
3. Keyword optimization for ATS systems
4. Skills and experience presentation
5. Grammar and language usage
6. Contact information completeness
7. Achievement quantification
8. Industry-specific requirements

Be constructive and specific in your feedback."#;

pub const EMPLOYEE_LOOKUP: &str = "\
Analyze the following employee report text and extract information about the employee \
named \"{employee_name}\" from {organization}.

Please provide the information in this exact format:
Name: [Employee Name]
Employee ID: [ID if available]
Department: [Department]
Position: [Job Title/Position]
Salary: [Salary information if available]
Joining Date: [Date if available]
Performance: [Performance details if available]
Contact: [Contact information if available]
Email: [Email if available]
Address: [Address if available]

If any information is not available, write \"Not Available\".
If the employee is not found, clearly state \"Employee not found in the report\".

Employee Report Text:
{document}";

pub const EMPLOYEE_ROSTER: &str = "\
Analyze the following employee report from {organization} and list all employee names mentioned.

Format the response as:
EMPLOYEES FOUND IN REPORT:
1. [Employee Name 1]
2. [Employee Name 2]
... and so on

Total Employees Found: [Number]

If no employees are found, state \"No employee names found in the report\".

Employee Report Text:
{document}";

pub const STORE_ASSISTANT: &str = "\
You are a helpful customer service representative for {organization}, a premium clothing company.

Company Context: {context}

Provide helpful, professional answers about our clothing products, services, or company \
information. Keep responses concise (under 200 words) and friendly. If asked about specific \
products, mention our quality and variety.";

pub const MODEL_PROBE: &str = "Say 'Model is working'";

/// (id, template) pairs loaded into every registry.
pub const BUILTIN: &[(&str, &str)] = &[
    ("medical_report", MEDICAL_REPORT),
    ("medical_report.section", MEDICAL_REPORT_SECTION),
    ("medical_report.consolidation", MEDICAL_REPORT_CONSOLIDATION),
    ("general_summary", GENERAL_SUMMARY),
    ("general_summary.section", GENERAL_SUMMARY_SECTION),
    ("general_summary.consolidation", GENERAL_SUMMARY_CONSOLIDATION),
    ("resume_review", RESUME_REVIEW),
    ("employee_lookup", EMPLOYEE_LOOKUP),
    ("employee_roster", EMPLOYEE_ROSTER),
    ("store_assistant", STORE_ASSISTANT),
    ("model_probe", MODEL_PROBE),
];

/// Ids used by the review, lookup, assistant and model-test routes. None of
/// them is an analysis use case.
pub const NON_ANALYSIS: &[&str] = &[
    "resume_review",
    "employee_lookup",
    "employee_roster",
    "store_assistant",
    "model_probe",
];
