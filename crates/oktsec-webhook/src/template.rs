/// Values substituted into a webhook template string: `{{RULE}}`,
/// `{{RULE_NAME}}`, `{{SEVERITY}}`, `{{FROM}}`, `{{TO}}`, `{{ACTION}}`,
/// `{{TIME}}`.
#[derive(Debug, Clone)]
pub struct TemplateVars {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: String,
    pub from: String,
    pub to: String,
    pub action: String,
    pub time: String,
}

/// Naive placeholder substitution; unknown `{{...}}` tokens are left as-is.
pub fn render_template(template: &str, vars: &TemplateVars) -> String {
    template
        .replace("{{RULE}}", &vars.rule_id)
        .replace("{{RULE_NAME}}", &vars.rule_name)
        .replace("{{SEVERITY}}", &vars.severity.to_uppercase())
        .replace("{{FROM}}", &vars.from)
        .replace("{{TO}}", &vars.to)
        .replace("{{ACTION}}", &vars.action)
        .replace("{{TIME}}", &vars.time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_all_known_placeholders() {
        let vars = TemplateVars {
            rule_id: "r1".into(),
            rule_name: "Rule One".into(),
            severity: "high".into(),
            from: "a".into(),
            to: "b".into(),
            action: "quarantine".into(),
            time: "t".into(),
        };
        let out = render_template("{{RULE}}/{{SEVERITY}}/{{FROM}}->{{TO}}:{{ACTION}}@{{TIME}}", &vars);
        assert_eq!(out, "r1/HIGH/a->b:quarantine@t");
    }

    #[test]
    fn unknown_placeholder_left_untouched() {
        let vars = TemplateVars {
            rule_id: "r1".into(),
            rule_name: "Rule One".into(),
            severity: "low".into(),
            from: "a".into(),
            to: "b".into(),
            action: "ignore".into(),
            time: "t".into(),
        };
        let out = render_template("{{UNKNOWN}} {{RULE}}", &vars);
        assert_eq!(out, "{{UNKNOWN}} r1");
    }
}
