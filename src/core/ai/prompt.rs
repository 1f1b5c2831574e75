/// 构建 PMD 违规修复提示词
pub fn build_fix_prompt(violation: &str, code: &str) -> String {
    format!(
        r#"Fix this Apex code PMD violation: "{violation}"

CODE:
```apex
{code}
```

Provide:
1. Fixed code (concise)
2. Brief explanation (1-2 sentences)

Keep response under 200 words."#
    )
}
