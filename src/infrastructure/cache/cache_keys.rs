pub fn shape_key(entity: &str) -> String {
    format!("shape:{}", entity)
}
