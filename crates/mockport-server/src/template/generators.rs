//! Synthetic data generators addressed as `namespace.name`.
//!
//! Names are matched case-insensitively. Arguments arrive as a JSON array;
//! every generator has sensible defaults when called without them.

use super::TemplateError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fake::faker::address::en::{
    BuildingNumber, CityName, CountryCode, CountryName, StateAbbr, StateName, StreetName,
    StreetSuffix, ZipCode,
};
use fake::faker::company::en::{Buzzword, CatchPhrase, CompanyName, Industry, Profession};
use fake::faker::internet::en::{DomainSuffix, FreeEmail, IPv4, IPv6, Password, SafeEmail, Username};
use fake::faker::lorem::en::{Paragraph, Sentence, Word, Words};
use fake::faker::name::en::{FirstName, LastName, Name, Title};
use fake::faker::phone_number::en::{CellNumber, PhoneNumber};
use fake::Fake;
use rand::distributions::{Alphanumeric, DistString};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use std::collections::HashMap;

pub type GeneratorFn = fn(&[Value]) -> Result<Value, TemplateError>;

/// Longest string (in characters) a generator will produce.
const MAX_LENGTH: usize = 10_000;
/// Most words or sentences a lorem generator will produce.
const MAX_WORDS: usize = 1_000;

const SECONDS_PER_DAY: i64 = 24 * 3600;
const SECONDS_PER_YEAR: i64 = 365 * SECONDS_PER_DAY;

const PRODUCT_ADJECTIVES: &[&str] = &[
    "Small", "Ergonomic", "Rustic", "Intelligent", "Gorgeous", "Incredible", "Fantastic",
    "Practical", "Sleek", "Awesome", "Generic", "Handcrafted", "Refined", "Licensed",
];
const PRODUCT_MATERIALS: &[&str] = &[
    "Steel", "Wooden", "Concrete", "Plastic", "Cotton", "Granite", "Rubber", "Metal", "Soft",
    "Fresh", "Frozen", "Bronze",
];
const PRODUCTS: &[&str] = &[
    "Chair", "Car", "Computer", "Keyboard", "Mouse", "Bike", "Ball", "Gloves", "Pants", "Shirt",
    "Table", "Shoes", "Hat", "Towels", "Soap", "Tuna", "Chicken", "Fish", "Cheese", "Bacon",
];
const DEPARTMENTS: &[&str] = &[
    "Books", "Movies", "Music", "Games", "Electronics", "Computers", "Home", "Garden", "Tools",
    "Grocery", "Health", "Beauty", "Toys", "Kids", "Baby", "Clothing", "Shoes", "Jewelery",
    "Sports", "Outdoors", "Automotive", "Industrial",
];

/// Lookup table of generators.
pub struct GeneratorRegistry {
    generators: HashMap<String, GeneratorFn>,
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            generators: HashMap::new(),
        };
        registry.register_builtin();
        registry
    }

    /// Add or replace a generator.
    pub fn register(&mut self, name: &str, generator: GeneratorFn) {
        self.generators.insert(name.to_ascii_lowercase(), generator);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.generators.contains_key(&name.to_ascii_lowercase())
    }

    pub fn generate(&self, name: &str, args: &[Value]) -> Result<Value, TemplateError> {
        let generator = self
            .generators
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| TemplateError::UnknownGenerator(name.to_string()))?;
        generator(args).map_err(|e| match e {
            TemplateError::InvalidArguments { reason, .. } => TemplateError::InvalidArguments {
                generator: name.to_string(),
                reason,
            },
            other => other,
        })
    }

    fn register_builtin(&mut self) {
        // string
        self.register("string.uuid", |_| Ok(uuid_value()));
        self.register("string.alpha", |args| {
            let len = length_arg(args, 0, 10, MAX_LENGTH)?;
            let mut rng = rand::thread_rng();
            let s: String = (0..len)
                .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
                .collect();
            Ok(Value::String(s))
        });
        self.register("string.alphanumeric", |args| {
            let len = length_arg(args, 0, 10, MAX_LENGTH)?;
            Ok(Value::String(
                Alphanumeric.sample_string(&mut rand::thread_rng(), len),
            ))
        });
        self.register("string.numeric", |args| {
            let len = length_arg(args, 0, 6, MAX_LENGTH)?;
            let mut rng = rand::thread_rng();
            let s: String = (0..len)
                .map(|_| char::from(rng.gen_range(b'0'..=b'9')))
                .collect();
            Ok(Value::String(s))
        });

        // number / datatype
        self.register("number.int", |args| {
            let (min, max) = int_range(args, 0, 1000)?;
            Ok(json!(rand::thread_rng().gen_range(min..=max)))
        });
        self.register("number.float", |args| {
            let min = f64_arg(args, 0, 0.0)?;
            let max = f64_arg(args, 1, 1000.0)?;
            let precision = usize_arg(args, 2, 2)?.min(10);
            Ok(json!(round_to(random_float(min, max)?, precision)))
        });
        self.register("datatype.number", |args| {
            let (min, max) = int_range(args, 0, 99999)?;
            Ok(json!(rand::thread_rng().gen_range(min..=max)))
        });
        self.register("datatype.boolean", |_| {
            Ok(Value::Bool(rand::thread_rng().gen_bool(0.5)))
        });
        self.register("datatype.uuid", |_| Ok(uuid_value()));

        // date
        self.register("date.past", |args| {
            let years = i64_arg(args, 0, 1)?.max(1);
            random_date(span(years, SECONDS_PER_YEAR)?, -1)
        });
        self.register("date.future", |args| {
            let years = i64_arg(args, 0, 1)?.max(1);
            random_date(span(years, SECONDS_PER_YEAR)?, 1)
        });
        self.register("date.recent", |args| {
            let days = i64_arg(args, 0, 1)?.max(1);
            random_date(span(days, SECONDS_PER_DAY)?, -1)
        });
        self.register("date.soon", |args| {
            let days = i64_arg(args, 0, 1)?.max(1);
            random_date(span(days, SECONDS_PER_DAY)?, 1)
        });
        self.register("date.birthdate", |_| {
            let years = rand::thread_rng().gen_range(18..=80);
            let date = Utc::now() - ChronoDuration::days(years * 365);
            Ok(Value::String(date.format("%Y-%m-%d").to_string()))
        });
        self.register("date.now", |_| Ok(Value::String(Utc::now().to_rfc3339())));
        self.register("date.timestamp", |_| Ok(json!(Utc::now().timestamp_millis())));

        // person / name
        self.register("person.firstName", |_| Ok(fake_string(FirstName())));
        self.register("person.lastName", |_| Ok(fake_string(LastName())));
        self.register("person.fullName", |_| Ok(fake_string(Name())));
        self.register("person.prefix", |_| Ok(fake_string(Title())));
        self.register("person.jobTitle", |_| Ok(fake_string(Profession())));
        self.register("name.firstName", |_| Ok(fake_string(FirstName())));
        self.register("name.lastName", |_| Ok(fake_string(LastName())));
        self.register("name.fullName", |_| Ok(fake_string(Name())));

        // internet
        self.register("internet.email", |_| Ok(fake_string(SafeEmail())));
        self.register("internet.freeEmail", |_| Ok(fake_string(FreeEmail())));
        self.register("internet.userName", |_| Ok(fake_string(Username())));
        self.register("internet.username", |_| Ok(fake_string(Username())));
        self.register("internet.password", |args| {
            let len = length_arg(args, 0, 12, MAX_LENGTH)?.max(1);
            Ok(fake_string(Password(len..len + 1)))
        });
        self.register("internet.ip", |_| Ok(fake_string(IPv4())));
        self.register("internet.ipv4", |_| Ok(fake_string(IPv4())));
        self.register("internet.ipv6", |_| Ok(fake_string(IPv6())));
        self.register("internet.domainName", |_| {
            let word: String = Word().fake();
            let suffix: String = DomainSuffix().fake();
            Ok(Value::String(format!("{}.{}", word.to_lowercase(), suffix)))
        });
        self.register("internet.url", |_| {
            let word: String = Word().fake();
            let suffix: String = DomainSuffix().fake();
            Ok(Value::String(format!(
                "https://{}.{}",
                word.to_lowercase(),
                suffix
            )))
        });

        // address
        self.register("address.city", |_| Ok(fake_string(CityName())));
        self.register("address.country", |_| Ok(fake_string(CountryName())));
        self.register("address.countryCode", |_| Ok(fake_string(CountryCode())));
        self.register("address.state", |_| Ok(fake_string(StateName())));
        self.register("address.stateAbbr", |_| Ok(fake_string(StateAbbr())));
        self.register("address.street", |_| Ok(fake_string(StreetName())));
        self.register("address.streetAddress", |_| {
            let number: String = BuildingNumber().fake();
            let street: String = StreetName().fake();
            let suffix: String = StreetSuffix().fake();
            Ok(Value::String(format!("{number} {street} {suffix}")))
        });
        self.register("address.buildingNumber", |_| Ok(fake_string(BuildingNumber())));
        self.register("address.zipCode", |_| Ok(fake_string(ZipCode())));
        self.register("address.latitude", |_| {
            Ok(json!(round_to(rand::thread_rng().gen_range(-90.0..=90.0), 6)))
        });
        self.register("address.longitude", |_| {
            Ok(json!(round_to(rand::thread_rng().gen_range(-180.0..=180.0), 6)))
        });

        // commerce
        self.register("commerce.productName", |_| {
            let mut rng = rand::thread_rng();
            Ok(Value::String(format!(
                "{} {} {}",
                pick(PRODUCT_ADJECTIVES, &mut rng),
                pick(PRODUCT_MATERIALS, &mut rng),
                pick(PRODUCTS, &mut rng)
            )))
        });
        self.register("commerce.product", |_| {
            Ok(Value::String(pick(PRODUCTS, &mut rand::thread_rng()).to_string()))
        });
        self.register("commerce.productAdjective", |_| {
            Ok(Value::String(
                pick(PRODUCT_ADJECTIVES, &mut rand::thread_rng()).to_string(),
            ))
        });
        self.register("commerce.productMaterial", |_| {
            Ok(Value::String(
                pick(PRODUCT_MATERIALS, &mut rand::thread_rng()).to_string(),
            ))
        });
        self.register("commerce.department", |_| {
            Ok(Value::String(pick(DEPARTMENTS, &mut rand::thread_rng()).to_string()))
        });
        self.register("commerce.price", |args| {
            let min = f64_arg(args, 0, 1.0)?;
            let max = f64_arg(args, 1, 1000.0)?;
            Ok(Value::String(format!("{:.2}", random_float(min, max)?)))
        });

        // lorem
        self.register("lorem.word", |_| Ok(fake_string(Word())));
        self.register("lorem.words", |args| {
            let count = length_arg(args, 0, 3, MAX_WORDS)?.max(1);
            let words: Vec<String> = Words(count..count + 1).fake();
            Ok(Value::String(words.join(" ")))
        });
        self.register("lorem.sentence", |args| {
            let count = length_arg(args, 0, 6, MAX_WORDS)?.max(1);
            Ok(fake_string(Sentence(count..count + 1)))
        });
        self.register("lorem.paragraph", |args| {
            let count = length_arg(args, 0, 3, MAX_WORDS)?.max(1);
            Ok(fake_string(Paragraph(count..count + 1)))
        });
        self.register("lorem.slug", |args| {
            let count = length_arg(args, 0, 3, MAX_WORDS)?.max(1);
            let words: Vec<String> = Words(count..count + 1).fake();
            Ok(Value::String(words.join("-").to_lowercase()))
        });

        // company
        self.register("company.name", |_| Ok(fake_string(CompanyName())));
        self.register("company.buzzword", |_| Ok(fake_string(Buzzword())));
        self.register("company.catchPhrase", |_| Ok(fake_string(CatchPhrase())));
        self.register("company.industry", |_| Ok(fake_string(Industry())));

        // phone
        self.register("phone.number", |_| Ok(fake_string(PhoneNumber())));
        self.register("phone.cell", |_| Ok(fake_string(CellNumber())));

        // helpers
        self.register("helpers.arrayElement", |args| {
            let items = match args {
                [Value::Array(items)] => items.as_slice(),
                items => items,
            };
            items
                .choose(&mut rand::thread_rng())
                .cloned()
                .ok_or_else(|| TemplateError::InvalidArguments {
                    generator: "helpers.arrayElement".to_string(),
                    reason: "expected a non-empty array".to_string(),
                })
        });
    }
}

fn fake_string<F>(faker: F) -> Value
where
    String: fake::Dummy<F>,
{
    Value::String(faker.fake::<String>())
}

fn uuid_value() -> Value {
    Value::String(uuid::Uuid::new_v4().to_string())
}

/// `count` units of `unit_seconds`, rejected when it does not fit an i64.
fn span(count: i64, unit_seconds: i64) -> Result<i64, TemplateError> {
    count
        .checked_mul(unit_seconds)
        .ok_or_else(|| invalid(format!("range of {count} is too large")))
}

fn shift_now(seconds: i64) -> Result<DateTime<Utc>, TemplateError> {
    ChronoDuration::try_seconds(seconds)
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .ok_or_else(|| invalid(format!("a {seconds}s offset leaves the supported date range")))
}

/// Random instant between 1s and `max_seconds` from now; `direction` is -1
/// for the past and 1 for the future. The far end must be a valid date.
fn random_date(max_seconds: i64, direction: i64) -> Result<Value, TemplateError> {
    shift_now(direction * max_seconds)?;
    let offset = rand::thread_rng().gen_range(1..=max_seconds);
    Ok(Value::String(shift_now(direction * offset)?.to_rfc3339()))
}

/// Uniform in `[min, max)`, bounds swapped if reversed.
fn random_float(min: f64, max: f64) -> Result<f64, TemplateError> {
    let (min, max) = if min > max { (max, min) } else { (min, max) };
    if !min.is_finite() || !max.is_finite() || !(max - min).is_finite() {
        return Err(invalid(format!("range {min}..{max} is too wide")));
    }
    if min == max {
        return Ok(min);
    }
    Ok(rand::thread_rng().gen_range(min..max))
}

fn pick<'a, R: Rng>(items: &'a [&'a str], rng: &mut R) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn round_to(value: f64, precision: usize) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

fn invalid(reason: impl Into<String>) -> TemplateError {
    TemplateError::InvalidArguments {
        generator: String::new(),
        reason: reason.into(),
    }
}

fn i64_arg(args: &[Value], index: usize, default: i64) -> Result<i64, TemplateError> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_i64()
            .or_else(|| v.as_f64().map(|f| f as i64))
            .ok_or_else(|| invalid(format!("argument {index} must be a number, got {v}"))),
    }
}

fn usize_arg(args: &[Value], index: usize, default: usize) -> Result<usize, TemplateError> {
    let value = i64_arg(args, index, default as i64)?;
    usize::try_from(value).map_err(|_| invalid(format!("argument {index} must not be negative")))
}

fn length_arg(
    args: &[Value],
    index: usize,
    default: usize,
    max: usize,
) -> Result<usize, TemplateError> {
    let len = usize_arg(args, index, default)?;
    if len > max {
        return Err(invalid(format!("argument {index} must be at most {max}, got {len}")));
    }
    Ok(len)
}

fn f64_arg(args: &[Value], index: usize, default: f64) -> Result<f64, TemplateError> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| invalid(format!("argument {index} must be a number, got {v}"))),
    }
}

/// `(min, max)` from positional args or a `{min, max}` object; swapped if reversed.
fn int_range(args: &[Value], min: i64, max: i64) -> Result<(i64, i64), TemplateError> {
    let (lo, hi) = match args {
        [Value::Object(map)] => (
            map.get("min").and_then(Value::as_i64).unwrap_or(min),
            map.get("max").and_then(Value::as_i64).unwrap_or(max),
        ),
        [single] => (min, i64_arg(std::slice::from_ref(single), 0, max)?),
        _ => (i64_arg(args, 0, min)?, i64_arg(args, 1, max)?),
    };
    Ok(if lo > hi { (hi, lo) } else { (lo, hi) })
}
