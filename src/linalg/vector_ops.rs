use std::ops::Div;

use faer::{Col, ColRef, unzip, zip};

use crate::E;

pub(crate) fn cwise_quotient<'a>(x1: ColRef<'a, E>, x2: ColRef<'a, E>) -> Col<E>
where
    E: Div<Output = E>,
{
    let mut out = Col::<E>::zeros(x1.nrows());

    zip!(x1, x2, out.as_mut()).for_each(|unzip!(x1, x2, out)| *out = *x1 / *x2);

    out
}

pub(crate) fn cwise_neg<'a>(x: ColRef<'a, E>) -> Col<E> {
    let mut out = Col::<E>::zeros(x.nrows());

    zip!(x, out.as_mut()).for_each(|unzip!(x, out)| *out = -*x);

    out
}

pub(crate) fn cwise_abs_max<'a>(x: ColRef<'a, E>) -> E {
    let mut maximum = E::from(0.);

    zip!(x).for_each(|unzip!(x)| maximum = E::max(maximum, x.abs()));

    maximum
}

pub(crate) fn col_dot<'a>(x1: ColRef<'a, E>, x2: ColRef<'a, E>) -> E {
    let mut acc = E::from(0.);

    zip!(x1, x2).for_each(|unzip!(x1, x2)| acc += *x1 * *x2);

    acc
}

pub(crate) fn is_col_positive<'a>(x: ColRef<'a, E>) -> bool {
    let mut res = true;
    zip!(x).for_each(|unzip!(x)| {
        if *x <= E::from(0.) {
            res = false
        }
    });
    res
}
