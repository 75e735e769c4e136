/// Turn `SNAKE_CASE` names into `PascalCase` logical ids.
///
/// Names without an underscore are returned unchanged.
pub fn snake_to_pascal(name: &str) -> String {
    if !name.contains('_') {
        return name.to_string();
    }

    name.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect()
}
