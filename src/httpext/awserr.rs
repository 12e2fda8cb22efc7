use {
    aws_sdk_sns::error::ProvideErrorMetadata,
    aws_smithy_runtime_api::client::result::SdkError,
    log::error,
    std::fmt::Debug,
};

/// If the result of an AWS API call is an error, log it along with the service's error code and message.
pub fn log_aws_err<O, E, R>(result: Result<O, SdkError<E, R>>, reason: &str) -> Result<O, SdkError<E, R>>
where
    E: ProvideErrorMetadata + Debug,
    R: Debug,
{
    if let Err(e) = &result {
        error!("{reason}: {}", aws_err_str(e));

        if let SdkError::ServiceError(service_error) = e {
            let err = service_error.err();
            error!("{reason}: code={:?} message={:?}", err.code(), err.message());
        }
    }

    result
}

/// Expand an AWS error into more detail than its Display implementation gives.
pub fn aws_err_str<E, R>(e: &SdkError<E, R>) -> String
where
    E: Debug,
    R: Debug,
{
    match e {
        SdkError::ConstructionFailure(c) => format!("construction failure: {c:?}"),
        SdkError::TimeoutError(t) => format!("timeout: {t:?}"),
        SdkError::DispatchFailure(d) => format!("dispatch failure: {d:?}"),
        SdkError::ResponseError(r) => format!("response error: {r:?}"),
        SdkError::ServiceError(s) => format!("service error: {:?}", s.err()),
        _ => format!("{e:?}"),
    }
}
