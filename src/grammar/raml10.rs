//! The RAML 1.0 grammar.
//!
//! Each `define` registers one named rule. Recursive shapes (nested
//! resources, inline type declarations) go through [`Rule::named`].

use super::rule::{field, ConditionalCase, ConditionalRules, KeyValueRule, ObjectRule, Rule};
use super::Grammar;
use crate::error::RamlError;
use crate::nodes::{ReferenceKind, Role};

pub const METHODS: [&str; 9] = [
    "get", "patch", "put", "post", "delete", "head", "options", "trace", "connect",
];

pub const ANNOTATION_TARGETS: [&str; 17] = [
    "API",
    "DocumentationItem",
    "Resource",
    "Method",
    "Response",
    "RequestBody",
    "ResponseBody",
    "TypeDeclaration",
    "Example",
    "ResourceType",
    "Trait",
    "SecurityScheme",
    "SecuritySchemeSettings",
    "AnnotationType",
    "Library",
    "Overlay",
    "Extension",
];

const SECURITY_SCHEME_TYPES: [&str; 5] = [
    "OAuth 1.0",
    "OAuth 2.0",
    "Basic Authentication",
    "Digest Authentication",
    "Pass Through",
];

const DATE_TYPES: [&str; 4] = ["date-only", "time-only", "datetime-only", "datetime"];

// ============================================================================
// SHARED FIELDS
// ============================================================================

fn text_field(name: &str, doc: &str) -> KeyValueRule {
    field(name, Rule::string()).described(doc)
}

fn annotation_field() -> Result<KeyValueRule, RamlError> {
    Ok(KeyValueRule::new(Rule::regex(r"\(.+\)")?, Rule::any())
        .repeated()
        .then(Role::Annotation))
}

/// Keys holding `<<parameter>>` expressions inside traits and resource types.
fn template_field() -> Result<KeyValueRule, RamlError> {
    Ok(KeyValueRule::new(Rule::regex(".*<<.+>>.*")?, Rule::any()).repeated())
}

/// A mapping of user chosen names to values of `value`, or nothing at all.
fn table(value: Rule, role: Option<Role>) -> Rule {
    let mut entry = KeyValueRule::new(Rule::string(), value).repeated();
    if let Some(role) = role {
        entry = entry.then(role);
    }
    Rule::any_of(vec![Rule::object(vec![entry]), Rule::null()])
}

fn declaration_fields() -> Vec<KeyValueRule> {
    vec![
        field("uses", Rule::named("uses")).described("Libraries used by this document"),
        field("types", Rule::named("typeDeclarations")).described("Type declarations"),
        field("schemas", Rule::named("typeDeclarations")),
        field("traits", Rule::named("traits")).described("Trait declarations"),
        field("resourceTypes", Rule::named("resourceTypes"))
            .described("Resource type declarations"),
        field("annotationTypes", Rule::named("annotationTypes"))
            .described("Annotation type declarations"),
        field("securitySchemes", Rule::named("securitySchemes"))
            .described("Security scheme declarations"),
    ]
}

fn resource_field() -> Result<KeyValueRule, RamlError> {
    Ok(KeyValueRule::new(
        Rule::regex("/.*")?.suggest("/"),
        Rule::named("resourceValue"),
    )
    .repeated()
    .then(Role::Resource))
}

fn api_fields(title_required: bool) -> Result<Vec<KeyValueRule>, RamlError> {
    let mut title = text_field("title", "Short plain-text label for the API");
    if title_required {
        title = title.required();
    }
    let mut fields = vec![
        title,
        text_field("description", "A substantial, human-friendly description of the API"),
        field("version", Rule::any_of(vec![Rule::string(), Rule::number()]))
            .described("The version of the API"),
        text_field("baseUri", "A URI that serves as the base for URIs of all resources"),
        field("baseUriParameters", Rule::named("parameters")),
        field("protocols", Rule::named("protocols")),
        field(
            "mediaType",
            Rule::any_of(vec![Rule::string(), Rule::array(Rule::string())]),
        )
        .described("Default media types for request and response bodies"),
        field("securedBy", Rule::named("securedBy")),
        field(
            "documentation",
            Rule::array(Rule::named("documentationItem")),
        )
        .described("Additional overall documentation for the API"),
    ];
    fields.extend(declaration_fields());
    fields.push(resource_field()?);
    fields.push(annotation_field()?);
    Ok(fields)
}

fn method_fields() -> Result<Vec<KeyValueRule>, RamlError> {
    Ok(vec![
        text_field("displayName", "An alternate, human-friendly method name"),
        text_field("description", "A longer, human-friendly description of the method"),
        field("queryParameters", Rule::named("parameters")),
        field("headers", Rule::named("parameters")),
        field("queryString", Rule::named("typeDeclarationValue")),
        field("responses", Rule::named("responses")),
        field("body", Rule::named("body")),
        field("protocols", Rule::named("protocols")),
        field("is", Rule::named("isTraits")),
        field("securedBy", Rule::named("securedBy")),
        annotation_field()?,
    ])
}

fn resource_fields(optional_methods: bool) -> Result<Vec<KeyValueRule>, RamlError> {
    let method_key = if optional_methods {
        Rule::regex(&format!(r"({})\??", METHODS.join("|")))?
    } else {
        Rule::any_of(METHODS.iter().map(|m| Rule::value(*m)).collect())
    };
    Ok(vec![
        text_field("displayName", "An alternate, human-friendly name for the resource"),
        text_field("description", "A substantial, human-friendly description of the resource"),
        KeyValueRule::new(method_key, Rule::named("methodValue")).then(Role::Method),
        field("is", Rule::named("isTraits")),
        field(
            "type",
            Rule::any_of(vec![
                Rule::reference(ReferenceKind::ResourceType),
                Rule::parametrized(ReferenceKind::ResourceType),
            ]),
        ),
        field("securedBy", Rule::named("securedBy")),
        field("uriParameters", Rule::named("parameters")),
        resource_field()?,
        annotation_field()?,
    ])
}

// ============================================================================
// TYPE DECLARATIONS
// ============================================================================

fn string_facets() -> Vec<KeyValueRule> {
    vec![
        field("pattern", Rule::string()),
        field("minLength", Rule::named("count")),
        field("maxLength", Rule::named("count")),
    ]
}

fn number_facets() -> Vec<KeyValueRule> {
    vec![
        field("minimum", Rule::number()),
        field("maximum", Rule::number()),
        field(
            "format",
            Rule::one_of_values([
                "int32", "int64", "int", "long", "float", "double", "int16", "int8",
            ]),
        ),
        field("multipleOf", Rule::number()),
    ]
}

fn date_facets() -> Vec<KeyValueRule> {
    vec![field("format", Rule::string())]
}

fn file_facets() -> Vec<KeyValueRule> {
    vec![
        field(
            "fileTypes",
            Rule::any_of(vec![Rule::string(), Rule::array(Rule::string())]),
        ),
        field("minLength", Rule::named("count")),
        field("maxLength", Rule::named("count")),
    ]
}

fn array_facets() -> Vec<KeyValueRule> {
    vec![
        field("items", Rule::named("typeDeclarationValue")),
        field("uniqueItems", Rule::boolean()),
        field("minItems", Rule::named("count")),
        field("maxItems", Rule::named("count")),
    ]
}

fn object_facets() -> Vec<KeyValueRule> {
    vec![
        field("properties", Rule::named("properties")),
        field("minProperties", Rule::named("count")),
        field("maxProperties", Rule::named("count")),
        field("additionalProperties", Rule::boolean()),
        field("discriminator", Rule::string()),
        field("discriminatorValue", Rule::any()),
    ]
}

/// Facets of every kind, for declarations whose kind is only known once the
/// type hierarchy is resolved.
fn all_facets() -> Vec<KeyValueRule> {
    let mut fields = string_facets();
    fields.extend([
        field("minimum", Rule::number()),
        field("maximum", Rule::number()),
        field("multipleOf", Rule::number()),
        field("format", Rule::string()),
        field(
            "fileTypes",
            Rule::any_of(vec![Rule::string(), Rule::array(Rule::string())]),
        ),
    ]);
    fields.extend(array_facets());
    fields.extend(object_facets());
    fields
}

fn values(names: &[&str]) -> Rule {
    Rule::any_of(names.iter().map(|n| Rule::value(*n)).collect())
}

fn type_declaration_object() -> Result<ObjectRule, RamlError> {
    let type_value = Rule::any_of(vec![
        Rule::string(),
        Rule::array(Rule::string()),
        Rule::named("typeDeclarationValue"),
    ]);
    let fields = vec![
        field("type", type_value.clone()).described("The type which the declared type extends"),
        field("schema", type_value),
        text_field("displayName", "An alternate, human-friendly name for the type"),
        text_field("description", "A substantial, human-friendly description of the type"),
        field("example", Rule::any().then(Role::Example)),
        field(
            "examples",
            table(Rule::any().then(Role::Example), None),
        ),
        field("default", Rule::any()),
        field("required", Rule::boolean()),
        field("enum", Rule::array(Rule::any())),
        field("facets", table(Rule::named("typeDeclarationValue"), None)),
        field("xml", Rule::any()),
        annotation_field()?,
    ];
    let conditional = ConditionalRules {
        keys: vec!["type", "schema"],
        cases: vec![
            ConditionalCase {
                when: Rule::value("string"),
                fields: string_facets(),
            },
            ConditionalCase {
                when: values(&["number", "integer"]),
                fields: number_facets(),
            },
            ConditionalCase {
                when: values(&DATE_TYPES),
                fields: date_facets(),
            },
            ConditionalCase {
                when: Rule::value("file"),
                fields: file_facets(),
            },
            ConditionalCase {
                when: Rule::any_of(vec![Rule::value("array"), Rule::regex(r"[^|]*\[\]")?]),
                fields: array_facets(),
            },
            ConditionalCase {
                when: Rule::value("object"),
                fields: object_facets(),
            },
            ConditionalCase {
                when: values(&["boolean", "nil", "any"]),
                fields: Vec::new(),
            },
        ],
        default: all_facets(),
    };
    Ok(ObjectRule {
        fields,
        conditional: Some(conditional),
        strict: false,
    })
}

// ============================================================================
// GRAMMAR
// ============================================================================

impl Grammar {
    /// Builds the RAML 1.0 grammar. Fails only on a malformed built-in pattern.
    pub fn raml10() -> Result<Grammar, RamlError> {
        let mut g = Grammar::new();

        g.define("api", Rule::object(api_fields(true)?).then(Role::Document));

        let mut extension = api_fields(false)?;
        extension.push(field("extends", Rule::string()).required());
        extension.push(text_field("usage", "How this extension should be used"));
        g.define("extension", Rule::object(extension).then(Role::Document));

        let mut library = vec![text_field("usage", "How this library should be used")];
        library.extend(declaration_fields());
        library.push(annotation_field()?);
        g.define("library", Rule::object(library).then(Role::Library));

        g.define(
            "uses",
            table(
                Rule::any_of(vec![Rule::named("library"), Rule::string()]),
                None,
            ),
        );

        g.define(
            "count",
            Rule::all_of(vec![Rule::integer(), Rule::range(Some(0.0), None)]),
        );
        g.define(
            "protocols",
            Rule::any_of(vec![
                Rule::array(Rule::one_of_values(["HTTP", "HTTPS"])),
                Rule::one_of_values(["HTTP", "HTTPS"]),
            ]),
        );

        // Resources and methods.
        g.define(
            "resourceValue",
            Rule::any_of(vec![Rule::object(resource_fields(false)?), Rule::null()]),
        );
        g.define(
            "methodValue",
            Rule::any_of(vec![Rule::object(method_fields()?), Rule::null()]),
        );
        g.define(
            "isTraits",
            Rule::any_of(vec![
                Rule::array(Rule::any_of(vec![
                    Rule::reference(ReferenceKind::Trait),
                    Rule::parametrized(ReferenceKind::Trait),
                ])),
                Rule::null(),
            ]),
        );
        g.define(
            "securedBy",
            Rule::any_of(vec![
                Rule::array(Rule::any_of(vec![
                    Rule::null(),
                    Rule::reference(ReferenceKind::SecurityScheme),
                    Rule::parametrized(ReferenceKind::SecurityScheme),
                ])),
                Rule::null(),
            ]),
        );

        let status = Rule::all_of(vec![
            Rule::integer(),
            Rule::range(Some(100.0), Some(599.0)),
        ])
        .suggest("200");
        g.define(
            "responses",
            Rule::any_of(vec![
                Rule::object(vec![KeyValueRule::new(status, Rule::named("responseValue"))
                    .repeated()
                    .then(Role::Response)]),
                Rule::null(),
            ]),
        );
        g.define(
            "responseValue",
            Rule::any_of(vec![
                Rule::object(vec![
                    text_field("description", "A description of the response"),
                    field("headers", Rule::named("parameters")),
                    field("body", Rule::named("body")),
                    annotation_field()?,
                ]),
                Rule::null(),
            ]),
        );

        let media_type = Rule::regex(r"[A-Za-z0-9.+*_-]+/[A-Za-z0-9.+*_-]+")?
            .suggest("application/json");
        g.define(
            "body",
            Rule::any_of(vec![
                Rule::object_with(ObjectRule {
                    fields: vec![KeyValueRule::new(
                        media_type,
                        Rule::named("typeDeclarationValue"),
                    )
                    .repeated()
                    .then(Role::Body)],
                    conditional: None,
                    strict: true,
                }),
                Rule::named("typeDeclarationValue"),
            ]),
        );

        // Types.
        g.define("typeDeclarations", table(Rule::named("typeDeclarationValue"), None));
        g.define(
            "typeDeclarationValue",
            Rule::any_of(vec![
                Rule::named("typeDeclaration"),
                Rule::string(),
                Rule::array(Rule::string()),
                Rule::null(),
            ])
            .then(Role::TypeDeclaration),
        );
        g.define("typeDeclaration", Rule::object_with(type_declaration_object()?));
        let properties = table(Rule::named("typeDeclarationValue"), Some(Role::Property));
        g.define("properties", properties.clone());
        g.define("parameters", properties);

        let mut data_type = type_declaration_object()?;
        data_type.fields.push(field("uses", Rule::named("uses")));
        data_type.fields.push(text_field("usage", "How this type should be used"));
        g.define(
            "dataTypeFragment",
            Rule::object_with(data_type).then(Role::TypeDeclaration),
        );

        // Declarations.
        let mut trait_fields = method_fields()?;
        trait_fields.push(text_field("usage", "How this trait should be used"));
        trait_fields.push(field("uses", Rule::named("uses")));
        trait_fields.push(template_field()?);
        g.define("traits", table(Rule::named("traitValue"), None));
        g.define(
            "traitValue",
            Rule::any_of(vec![Rule::object(trait_fields), Rule::null()]).then(Role::Trait),
        );

        let mut resource_type_fields = resource_fields(true)?;
        resource_type_fields.push(text_field("usage", "How this resource type should be used"));
        resource_type_fields.push(field("uses", Rule::named("uses")));
        resource_type_fields.push(template_field()?);
        g.define("resourceTypes", table(Rule::named("resourceTypeValue"), None));
        g.define(
            "resourceTypeValue",
            Rule::any_of(vec![Rule::object(resource_type_fields), Rule::null()])
                .then(Role::ResourceType),
        );

        let mut annotation_type = type_declaration_object()?;
        let target = Rule::one_of_values(ANNOTATION_TARGETS);
        annotation_type.fields.push(field(
            "allowedTargets",
            Rule::any_of(vec![target.clone(), Rule::array(target)]),
        ));
        g.define("annotationTypes", table(Rule::named("annotationTypeValue"), None));
        g.define(
            "annotationTypeValue",
            Rule::any_of(vec![
                Rule::object_with(annotation_type),
                Rule::string(),
                Rule::null(),
            ])
            .then(Role::AnnotationType),
        );

        let scheme_type = Rule::any_of(vec![
            Rule::one_of_values(SECURITY_SCHEME_TYPES),
            Rule::regex("x-.+")?,
        ]);
        g.define("securitySchemes", table(Rule::named("securitySchemeValue"), None));
        g.define(
            "securitySchemeValue",
            Rule::object(vec![
                field("type", scheme_type).required(),
                text_field("displayName", "An alternate, human-friendly name"),
                text_field("description", "Information about the security scheme"),
                field("describedBy", Rule::named("methodValue")),
                field("settings", Rule::any()),
                annotation_field()?,
            ])
            .then(Role::SecurityScheme),
        );

        g.define(
            "documentationItem",
            Rule::object(vec![
                text_field("title", "Title of the documentation section").required(),
                text_field("content", "Content of the documentation section").required(),
            ])
            .then(Role::DocumentationItem),
        );
        g.define("namedExample", Rule::any().then(Role::Example));

        g.verify()?;
        Ok(g)
    }
}
