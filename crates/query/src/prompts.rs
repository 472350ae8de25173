//! Prompt templates for global (map, reduce) and local search.

const REFERENCE_RULES: &str = r#"Points supported by data should list their data references as follows:

"This is an example sentence supported by data references [Data: Reports (report ids)]"

**Do not list more than 5 record ids in a single reference**. Instead, list the top 5 most relevant record ids and add "+more" to indicate that there are more.

For example:
"Person X is the owner of Company Y and subject to many allegations of wrongdoing [Data: Reports (2, 7, 64, 46, 34, +more)]. He is also CEO of company X [Data: Reports (1, 3)]"

where 1, 2, 3, 7, 34, 46, and 64 represent the id (not the index) of the relevant data record.

Do not include information where the supporting evidence for it is not provided."#;

const LOCAL_REFERENCE_RULES: &str = r#"Points supported by data should list their data references as follows:

"This is an example sentence supported by multiple data references [Data: <dataset name> (record ids); <dataset name> (record ids)]."

Do not list more than 5 record ids in a single reference. Instead, list the top 5 most relevant record ids and add "+more" to indicate that there are more.

For example:

"Person X is the owner of Company Y and subject to many allegations of wrongdoing [Data: Sources (15, 16); Reports (1); Entities (5, 7); Relationships (23, 2, 34, 46, 64, +more)]."

Do not include information where the supporting evidence for it is not provided."#;

/// Map stage: one community report table in, scored key points out as JSON.
pub fn build_map_prompt(context_data: &str, question: &str) -> String {
    format!(
        r#"---Role---

You are a helpful assistant responding to questions about data in the tables provided.

---Goal---

Generate a response consisting of a list of key points that responds to the user's question, summarizing all relevant information in the input data tables.

Use the data provided in the data tables below as the primary context for generating the response.
If you don't know the answer or if the input data tables do not contain sufficient information to provide an answer, just say so. Do not make anything up.

Each key point in the response should have the following element:
- Description: A comprehensive description of the point.
- Importance Score: An integer score between 0-100 that indicates how important the point is in answering the user's question. An 'I don't know' type of response should have a score of 0.

The response shall preserve the original meaning and use of modal verbs such as "shall", "may" or "will".

{REFERENCE_RULES}

---Data tables---

{context_data}

---Question---

{question}

The response should be JSON formatted as follows and nothing else:
{{
    "points": [
        {{"description": "Description of point 1 [Data: Reports (report ids)]", "score": score_value}},
        {{"description": "Description of point 2 [Data: Reports (report ids)]", "score": score_value}}
    ]
}}
"#
    )
}

/// Reduce stage: ranked analyst points in, final prose answer out.
pub fn build_reduce_prompt(report_data: &str, response_type: &str, question: &str) -> String {
    format!(
        r#"---Role---

You are a helpful assistant responding to questions about a dataset by synthesizing perspectives from multiple analysts.

---Goal---

Generate a response of the target length and format that responds to the user's question, summarizing all the reports from multiple analysts who focused on different parts of the dataset.

Note that the analysts' reports provided below are ranked in the **descending order of importance**.

If you don't know the answer or if the provided reports do not contain sufficient information to provide an answer, just say so. Do not make anything up.

The final response should remove all irrelevant information from the analysts' reports and merge the cleaned information into a comprehensive answer that provides explanations of all the key points and implications appropriate for the response length and format.

The response shall preserve the original meaning and use of modal verbs such as "shall", "may" or "will".

The response should also preserve all the data references previously included in the analysts' reports, but do not mention the roles of multiple analysts in the analysis process.

{REFERENCE_RULES}

---Target response length and format---

{response_type}

---Analyst Reports---

{report_data}

---Question---

{question}

Add sections and commentary to the response as appropriate for the length and format. Style the response in markdown.
"#
    )
}

/// Local search: entity neighbourhood tables in, prose answer out.
pub fn build_local_prompt(context_data: &str, response_type: &str, question: &str) -> String {
    format!(
        r#"---Role---

You are a helpful assistant responding to questions about data in the tables provided.

---Goal---

Generate a response of the target length and format that responds to the user's question, summarizing all information in the input data tables appropriate for the response length and format, and incorporating any relevant general knowledge.

If you don't know the answer, just say so. Do not make anything up.

{LOCAL_REFERENCE_RULES}

---Target response length and format---

{response_type}

---Data tables---

{context_data}

---Question---

{question}

Add sections and commentary to the response as appropriate for the length and format. Style the response in markdown.
"#
    )
}
