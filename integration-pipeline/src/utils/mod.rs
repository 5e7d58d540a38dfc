pub mod llm_instructions;
