use std::{collections::HashMap, str::FromStr};

use futures::TryStreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use warp::{hyper::body::Buf, multipart::FormData};

use super::error::{Error, ErrorKind, TypeError};

pub type FormFields = HashMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Text fields and files of a submitted form.
#[derive(Debug, Default)]
pub struct Form {
    inner: FormFields,
    files: HashMap<String, UploadedFile>,
}

struct RawPart {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

impl Form {
    pub fn from_data(data: FormFields) -> Self {
        Self {
            inner: data,
            files: HashMap::new(),
        }
    }

    pub fn with_file(mut self, key: &str, file: UploadedFile) -> Self {
        self.files.insert(key.to_string(), file);
        self
    }

    /// Drains a multipart body. Parts carrying a filename become files,
    /// everything else must be UTF-8 text.
    pub async fn from_multipart(data: FormData) -> Result<Self, Error> {
        let parts: Vec<RawPart> = data
            .and_then(|mut part| async move {
                let mut bytes: Vec<u8> = Vec::new();
                while let Some(chunk) = part.data().await {
                    let mut chunk = chunk?;
                    while chunk.has_remaining() {
                        let read = {
                            let slice = chunk.chunk();
                            bytes.extend_from_slice(slice);
                            slice.len()
                        };
                        chunk.advance(read);
                    }
                }

                Ok::<_, warp::Error>(RawPart {
                    name: part.name().to_string(),
                    filename: part.filename().map(str::to_string),
                    content_type: part.content_type().map(str::to_string),
                    bytes,
                })
            })
            .try_collect()
            .await
            .map_err(|e| ErrorKind::InvalidRequest.new(&format!("Malformed form: {e}")))?;

        let mut form = Self::default();
        for part in parts {
            match part.filename {
                Some(filename) => {
                    form.files.insert(
                        part.name,
                        UploadedFile {
                            filename: Some(filename),
                            content_type: part.content_type,
                            bytes: part.bytes,
                        },
                    );
                }
                None => {
                    let text = String::from_utf8(part.bytes)
                        .map_err(|_e| TypeError::new(&part.name, "Expected UTF-8 text"))?;
                    form.inner.insert(part.name, Value::String(text));
                }
            }
        }

        Ok(form)
    }

    pub fn get_str(&self, key: &str) -> Result<String, TypeError> {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => Ok(v.to_string()),
                None => Err(TypeError::new(key, "Expected a string")),
            },
            None => Err(TypeError::new(key, "This field is required")),
        }
    }

    pub fn get_number<T>(&self, key: &str) -> Result<T, TypeError>
    where
        T: FromStr,
    {
        let text = match self.inner.get(key) {
            Some(Value::String(v)) => v.trim().to_string(),
            Some(Value::Number(v)) => v.to_string(),
            Some(_) => return Err(TypeError::new(key, "Expected a number")),
            None => return Err(TypeError::new(key, "This field is required")),
        };

        text.parse()
            .map_err(|_e| TypeError::new(key, "Expected a valid integer"))
    }

    /// Reads a field holding JSON, either already structured or sent as text.
    pub fn get_json<T>(&self, key: &str) -> Result<T, TypeError>
    where
        T: DeserializeOwned,
    {
        let value = match self.inner.get(key) {
            Some(Value::String(v)) => serde_json::from_str::<Value>(v)
                .map_err(|_e| TypeError::new(key, "Expected valid JSON"))?,
            Some(v) => v.to_owned(),
            None => return Err(TypeError::new(key, "This field is required")),
        };

        serde_json::from_value(value).map_err(|e| TypeError::new(key, &format!("{e}")))
    }

    pub fn has_file(&self, key: &str) -> bool {
        self.files.contains_key(key)
    }

    pub fn take_file(&mut self, key: &str) -> Option<UploadedFile> {
        self.files.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::IngredientAmount;
    use serde_json::json;

    fn form(pairs: &[(&str, Value)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_owned()))
                .collect(),
        )
    }

    #[test]
    fn reads_numbers_sent_as_text() {
        let form = form(&[("cooking_time", json!(" 15 "))]);

        assert_eq!(form.get_number::<i32>("cooking_time").unwrap(), 15);
    }

    #[test]
    fn missing_and_invalid_numbers_name_the_field() {
        let form = form(&[("cooking_time", json!("soon"))]);

        let invalid = form.get_number::<i32>("cooking_time").unwrap_err();
        let missing = form.get_number::<i32>("servings").unwrap_err();

        assert_eq!(invalid.field(), "cooking_time");
        assert_eq!(missing.info(), "This field is required");
    }

    #[test]
    fn json_field_accepts_text_and_structured_values() {
        let as_text = form(&[("ingredients", json!(r#"[{"id": 1, "amount": 5}]"#))]);
        let structured = form(&[("ingredients", json!([{ "id": 1, "amount": 5 }]))]);

        let expected = vec![IngredientAmount { id: 1, amount: 5 }];
        assert_eq!(
            as_text.get_json::<Vec<IngredientAmount>>("ingredients").unwrap(),
            expected
        );
        assert_eq!(
            structured.get_json::<Vec<IngredientAmount>>("ingredients").unwrap(),
            expected
        );
    }

    #[tokio::test]
    async fn multipart_body_splits_text_and_files() {
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"name\"\r\n\r\n",
            "Soup\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"image\"; filename=\"soup.png\"\r\n",
            "Content-Type: image/png\r\n\r\n",
            "\u{89}PNG\r\n",
            "--XBOUNDARY--\r\n",
        );

        let data = warp::test::request()
            .method("POST")
            .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
            .body(body)
            .filter(&warp::multipart::form())
            .await
            .unwrap();

        let mut form = Form::from_multipart(data).await.unwrap();

        assert_eq!(form.get_str("name").unwrap(), "Soup");
        let image = form.take_file("image").unwrap();
        assert_eq!(image.filename.as_deref(), Some("soup.png"));
        assert_eq!(image.content_type.as_deref(), Some("image/png"));
        assert!(image.bytes.ends_with(b"PNG"));
        assert!(form.take_file("image").is_none());
    }
}
